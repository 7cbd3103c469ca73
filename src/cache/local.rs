use std::sync::Arc;
use std::time::Duration;

use metrics::increment_counter;

use crate::entities::Listing;

/// Per-process listing cache. Values are immutable snapshots behind `Arc` so
/// concurrent readers share one allocation.
#[derive(Clone)]
pub struct LocalCache {
    inner: moka::future::Cache<String, Arc<Vec<Listing>>>,
}

impl LocalCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            inner: moka::future::Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<Listing>>> {
        let hit = self.inner.get(key);
        if hit.is_none() {
            increment_counter!("markethub_cache_miss", "tier" => "local");
        }
        hit
    }

    pub async fn insert(&self, key: String, listings: Arc<Vec<Listing>>) {
        self.inner.insert(key, listings).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
