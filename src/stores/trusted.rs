use sqlx::PgPool;

use crate::entities::TrustedSource;
use crate::util::sha512_hex;

/// Registry of authenticated uploading applications, keyed by API-key hash.
pub struct TrustedSourceRegistry {
    pool: PgPool,
}

impl TrustedSourceRegistry {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Looks up the sha512 of a plaintext key. The registry never stores or
    /// logs plaintext keys.
    pub async fn get(&self, api_key: &str) -> Result<Option<TrustedSource>, sqlx::Error> {
        sqlx::query_as::<_, TrustedSource>(
            "SELECT api_key_hash, name, upload_count FROM trusted_source WHERE api_key_hash = $1",
        )
        .bind(sha512_hex(api_key))
        .fetch_optional(&self.pool)
        .await
    }

    /// Atomic upload-counter increment; concurrent uploads by the same
    /// source each land.
    pub async fn increment(&self, api_key_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE trusted_source SET upload_count = upload_count + 1 WHERE api_key_hash = $1",
        )
        .bind(api_key_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<TrustedSource>, sqlx::Error> {
        sqlx::query_as::<_, TrustedSource>(
            "SELECT api_key_hash, name, upload_count FROM trusted_source ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
    }
}
