//! Two-tier listing cache: a per-process moka tier and a shared redis tier.
//! Both tiers share one key space.

use std::time::Duration;

pub mod distributed;
pub mod local;

pub use distributed::DistributedCache;
pub use local::LocalCache;

/// Local tier TTL. Cross-process staleness is bounded by this value.
pub const LOCAL_TTL: Duration = Duration::from_secs(60);

/// Local tier entry bound.
pub const LOCAL_MAX_ENTRIES: u64 = 10_000;

/// Distributed tier TTL.
pub const DISTRIBUTED_TTL: Duration = Duration::from_secs(10 * 60);

/// Bound on a distributed-tier probe. Expiry is a miss, never an error.
pub const DISTRIBUTED_READ_BOUND: Duration = Duration::from_secs(1);

/// Cache key for the live listing set of one (world, item) pair.
pub fn listing_key(world_id: i32, item_id: i32) -> String {
    format!("listing4:{world_id}:{item_id}")
}

/// Cache key for a world's tax-rate hash.
pub fn tax_key(world_id: i32) -> String {
    format!("tax:{world_id}")
}

#[cfg(test)]
mod tests {
    use super::{listing_key, tax_key};

    #[test]
    fn keys_are_stable() {
        assert_eq!(listing_key(23, 5057), "listing4:23:5057");
        assert_eq!(tax_key(74), "tax:74");
    }
}
