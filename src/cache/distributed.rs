use std::time::Duration;

use metrics::increment_counter;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::DISTRIBUTED_READ_BOUND;
use crate::entities::Listing;

/// Shared redis tier. Values are zstd-compressed bincode sequences of
/// listings; bincode length-prefixes the sequence.
#[derive(Clone)]
pub struct DistributedCache {
    primary: ConnectionManager,
    replicas: Vec<ConnectionManager>,
}

#[derive(Debug, thiserror::Error)]
enum CodecError {
    #[error("encode: {0}")]
    Encode(#[from] bincode::Error),
    #[error("compress: {0}")]
    Compress(#[from] std::io::Error),
}

fn encode(listings: &[Listing]) -> Result<Vec<u8>, CodecError> {
    let raw = bincode::serialize(listings)?;
    Ok(zstd::encode_all(raw.as_slice(), 1)?)
}

fn decode(bytes: &[u8]) -> Result<Vec<Listing>, CodecError> {
    let raw = zstd::decode_all(bytes)?;
    Ok(bincode::deserialize(&raw)?)
}

/// Replica-ratio-weighted read preference: pick a replica with probability
/// `1 / (1 + R)`, otherwise the master.
fn prefer_replica(replica_count: usize, sample: f64) -> bool {
    replica_count > 0 && sample < 1.0 / (1.0 + replica_count as f64)
}

impl DistributedCache {
    pub async fn connect(primary_url: &str, replica_urls: &[String]) -> redis::RedisResult<Self> {
        let primary = redis::Client::open(primary_url)?
            .get_tokio_connection_manager()
            .await?;
        let mut replicas = Vec::with_capacity(replica_urls.len());
        for url in replica_urls {
            replicas.push(
                redis::Client::open(url.as_str())?
                    .get_tokio_connection_manager()
                    .await?,
            );
        }
        Ok(Self { primary, replicas })
    }

    fn read_connection(&self) -> ConnectionManager {
        let mut rng = rand::thread_rng();
        if prefer_replica(self.replicas.len(), rng.gen()) {
            self.replicas[rng.gen_range(0..self.replicas.len())].clone()
        } else {
            self.primary.clone()
        }
    }

    /// Bounded probe. A timeout or connection failure is a miss, never an
    /// error; the caller falls through to the database.
    pub async fn get(&self, key: &str) -> Option<Vec<Listing>> {
        let mut conn = self.read_connection();
        let probe = conn.get::<_, Option<Vec<u8>>>(key);
        let bytes = match tokio::time::timeout(DISTRIBUTED_READ_BOUND, probe).await {
            Err(_) => {
                increment_counter!("markethub_cache_timeout");
                return None;
            }
            Ok(Err(err)) => {
                debug!(key, error = %err, "distributed cache read failed");
                increment_counter!("markethub_cache_miss", "tier" => "distributed");
                return None;
            }
            Ok(Ok(None)) => {
                increment_counter!("markethub_cache_miss", "tier" => "distributed");
                return None;
            }
            Ok(Ok(Some(bytes))) => bytes,
        };

        match decode(&bytes) {
            Ok(listings) => Some(listings),
            Err(err) => {
                warn!(key, error = %err, "discarding undecodable cache value");
                None
            }
        }
    }

    /// Fire-and-forget population.
    pub fn put(&self, key: String, listings: &[Listing], ttl: Duration) {
        let bytes = match encode(listings) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, error = %err, "failed to encode cache value");
                return;
            }
        };
        let mut conn = self.primary.clone();
        tokio::spawn(async move {
            if let Err(err) = conn
                .set_ex::<_, _, ()>(&key, bytes, ttl.as_secs() as usize)
                .await
            {
                debug!(key, error = %err, "distributed cache write failed");
            }
        });
    }

    /// Fire-and-forget removal.
    pub fn invalidate(&self, key: String) {
        let mut conn = self.primary.clone();
        tokio::spawn(async move {
            if let Err(err) = conn.del::<_, ()>(&key).await {
                debug!(key, error = %err, "distributed cache invalidation failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sqlx::types::Json;

    use super::{decode, encode, prefer_replica};
    use crate::entities::{Listing, Materia};

    fn listing() -> Listing {
        Listing {
            listing_id: "A".into(),
            item_id: 5057,
            world_id: 23,
            hq: true,
            on_mannequin: false,
            materia: Json(vec![
                Materia {
                    slot_id: 0,
                    materia_id: 41,
                },
                Materia {
                    slot_id: 1,
                    materia_id: 7,
                },
            ]),
            unit_price: 100,
            quantity: 1,
            dye_id: 0,
            creator_id: "c1".into(),
            creator_name: "Crafter".into(),
            last_review_time: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            retainer_id: "r1".into(),
            retainer_name: "Retainer".into(),
            retainer_city_id: 1,
            seller_id: "s1".into(),
            uploaded_at: chrono::Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
            source: "test".into(),
        }
    }

    #[test]
    fn codec_preserves_listings_and_materia_order() {
        let listings = vec![listing()];
        let decoded = decode(&encode(&listings).unwrap()).unwrap();
        assert_eq!(decoded, listings);
        assert_eq!(decoded[0].materia.0[0].materia_id, 41);
        assert_eq!(decoded[0].materia.0[1].materia_id, 7);
    }

    #[test]
    fn replica_preference_follows_ratio() {
        // no replicas: always master
        assert!(!prefer_replica(0, 0.0));
        // one replica: replica wins below 1/2
        assert!(prefer_replica(1, 0.49));
        assert!(!prefer_replica(1, 0.51));
        // three replicas: replica wins below 1/4
        assert!(prefer_replica(3, 0.24));
        assert!(!prefer_replica(3, 0.26));
    }
}
