use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::entities::UploadCountHistory;

const DAY_MS: i64 = 86_400_000;
const MAX_DAYS: usize = 30;

/// Rolling 30-day upload counters, held in a singleton row (`id = 1`).
pub struct UploadCountStore {
    pool: PgPool,
}

impl UploadCountStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rolls the window over when a day has passed since `last_push`, then
    /// increments today's counter. Runs under a row lock so concurrent
    /// uploads serialize on the singleton.
    pub async fn increment(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (DateTime<Utc>, Json<Vec<i64>>)>(
            "SELECT last_push, counts FROM upload_count_history WHERE id = 1 FOR UPDATE",
        )
        .fetch_optional(&mut tx)
        .await?;

        let now = Utc::now();
        let mut history = match row {
            Some((last_push, Json(counts))) => {
                roll_over(UploadCountHistory { last_push, counts }, now)
            }
            None => UploadCountHistory {
                last_push: now,
                counts: vec![0],
            },
        };
        if history.counts.is_empty() {
            history.counts.push(0);
        }
        history.counts[0] += 1;

        sqlx::query(
            "INSERT INTO upload_count_history (id, last_push, counts) VALUES (1, $1, $2)
             ON CONFLICT (id) DO UPDATE
             SET last_push = EXCLUDED.last_push, counts = EXCLUDED.counts",
        )
        .bind(history.last_push)
        .bind(Json(&history.counts))
        .execute(&mut tx)
        .await?;

        tx.commit().await
    }

    /// The record, verbatim.
    pub async fn retrieve(&self) -> Result<Option<UploadCountHistory>, sqlx::Error> {
        let row = sqlx::query_as::<_, (DateTime<Utc>, Json<Vec<i64>>)>(
            "SELECT last_push, counts FROM upload_count_history WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(last_push, Json(counts))| UploadCountHistory { last_push, counts }))
    }
}

/// Day-rollover: prepend a fresh counter and keep the window at 30 entries.
fn roll_over(mut history: UploadCountHistory, now: DateTime<Utc>) -> UploadCountHistory {
    if (now - history.last_push).num_milliseconds() > DAY_MS {
        history.counts.insert(0, 0);
        history.counts.truncate(MAX_DAYS);
        history.last_push = now;
    }
    history
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{roll_over, MAX_DAYS};
    use crate::entities::UploadCountHistory;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn same_day_leaves_window_untouched() {
        let history = UploadCountHistory {
            last_push: at(1_700_000_000),
            counts: vec![5, 3],
        };
        let now = history.last_push + Duration::hours(23);
        let rolled = roll_over(history.clone(), now);
        assert_eq!(rolled, history);
    }

    #[test]
    fn day_boundary_prepends_fresh_counter() {
        let history = UploadCountHistory {
            last_push: at(1_700_000_000),
            counts: vec![5, 3],
        };
        let now = history.last_push + Duration::hours(25);
        let rolled = roll_over(history, now);
        assert_eq!(rolled.counts, vec![0, 5, 3]);
        assert_eq!(rolled.last_push, now);
    }

    #[test]
    fn window_is_capped_at_thirty_days() {
        let history = UploadCountHistory {
            last_push: at(1_700_000_000),
            counts: (0..30).collect(),
        };
        let now = history.last_push + Duration::days(2);
        let rolled = roll_over(history, now);
        assert_eq!(rolled.counts.len(), MAX_DAYS);
        assert_eq!(rolled.counts[0], 0);
        assert_eq!(rolled.counts[MAX_DAYS - 1], 28);
    }
}
