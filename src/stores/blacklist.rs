use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

/// Flagged-uploader set. Members are sha256 hex digests of uploader ids;
/// removal is out of scope.
pub struct Blacklist {
    conn: ConnectionManager,
}

const KEY: &str = "blacklist";

impl Blacklist {
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Membership test. An unreachable store reads as "not flagged" so
    /// uploads keep flowing.
    pub async fn has(&self, uploader_hash: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.sismember::<_, _, bool>(KEY, uploader_hash).await {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "blacklist lookup failed");
                false
            }
        }
    }

    pub async fn add(&self, uploader_hash: &str) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.sadd(KEY, uploader_hash).await
    }
}
