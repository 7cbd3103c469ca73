use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Relational schema (embedded).
const SCHEMA: &str = include_str!("schema.sql");

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

/// Applies the embedded schema. Postgres rejects multiple statements in one
/// prepared statement, so the schema is split and executed one by one.
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in schema_statements(SCHEMA) {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{schema_statements, SCHEMA};

    #[test]
    fn splits_statements_and_drops_comment_blocks() {
        let statements = schema_statements("-- comment only;\nCREATE TABLE a (x int);\n\n;");
        assert_eq!(statements.len(), 1);
        assert!(statements[0].ends_with("CREATE TABLE a (x int)"));
    }

    #[test]
    fn embedded_schema_is_non_empty() {
        assert!(schema_statements(SCHEMA).len() >= 6);
    }
}
