//! Live listing store: replace-per-upload writes, bulk reads, and the
//! two-tier cache with write-through invalidation.
//!
//! Requests are cooperative tasks; dropping a caller's future aborts pending
//! I/O. Partially applied batches are not rolled back (logged instead).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::error;

use crate::cache::{self, DistributedCache, LocalCache, DISTRIBUTED_TTL};
use crate::entities::Listing;

const INSERT_LISTING: &str = "INSERT INTO listing (
        listing_id, item_id, world_id, hq, on_mannequin, materia,
        unit_price, quantity, dye_id, creator_id, creator_name,
        last_review_time, retainer_id, retainer_name, retainer_city_id,
        seller_id, uploaded_at, source)
    VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
    ON CONFLICT (listing_id) DO NOTHING";

pub struct ListingStore {
    pool: PgPool,
    local: LocalCache,
    distributed: DistributedCache,
}

impl ListingStore {
    pub const fn new(pool: PgPool, local: LocalCache, distributed: DistributedCache) -> Self {
        Self {
            pool,
            local,
            distributed,
        }
    }

    /// Replaces the live set for every (world, item) pair present in the
    /// input. Each pair is one transactional delete-then-insert batch whose
    /// rows share an `uploaded_at` stamped at batch start; conflicting
    /// `listing_id`s retain the existing row. An empty input set for a pair
    /// cannot arise here; see [`Self::delete_live`] for the empty-replace
    /// case.
    ///
    /// On a mid-call failure, groups that already committed stay committed
    /// with their caches invalidated; no compensating deletion is attempted.
    pub async fn replace_live(&self, listings: Vec<Listing>) -> Result<(), sqlx::Error> {
        for ((world_id, item_id), group) in group_by_pair(listings) {
            if let Err(err) = self.replace_group(world_id, item_id, group).await {
                error!(world_id, item_id, error = %err, "listing replace failed");
                return Err(err);
            }
            self.invalidate_tiers(world_id, item_id).await;
        }
        Ok(())
    }

    async fn replace_group(
        &self,
        world_id: i32,
        item_id: i32,
        group: Vec<Listing>,
    ) -> Result<(), sqlx::Error> {
        let uploaded_at = Utc::now();
        let incoming_ids: Vec<String> = group
            .iter()
            .map(|listing| listing.listing_id.clone())
            .collect();
        let mut tx = self.pool.begin().await?;

        // Drop only the rows absent from this upload; re-uploaded ids survive
        // the delete and keep their original row through the conflict clause
        // below.
        sqlx::query(
            "DELETE FROM listing
             WHERE world_id = $1 AND item_id = $2 AND listing_id <> ALL($3)",
        )
        .bind(world_id)
        .bind(item_id)
        .bind(&incoming_ids)
        .execute(&mut tx)
        .await?;

        for listing in group {
            sqlx::query(INSERT_LISTING)
                .bind(&listing.listing_id)
                .bind(item_id)
                .bind(world_id)
                .bind(listing.hq)
                .bind(listing.on_mannequin)
                .bind(&listing.materia)
                .bind(listing.unit_price)
                .bind(listing.quantity)
                .bind(listing.dye_id)
                .bind(&listing.creator_id)
                .bind(&listing.creator_name)
                .bind(listing.last_review_time)
                .bind(&listing.retainer_id)
                .bind(&listing.retainer_name)
                .bind(listing.retainer_city_id)
                .bind(&listing.seller_id)
                .bind(uploaded_at)
                .bind(&listing.source)
                .execute(&mut tx)
                .await?;
        }

        tx.commit().await
    }

    /// Deletes the live set for one pair and invalidates both tiers.
    pub async fn delete_live(&self, world_id: i32, item_id: i32) -> Result<(), sqlx::Error> {
        if let Err(err) = sqlx::query("DELETE FROM listing WHERE world_id = $1 AND item_id = $2")
            .bind(world_id)
            .bind(item_id)
            .execute(&self.pool)
            .await
        {
            error!(world_id, item_id, error = %err, "listing delete failed");
            return Err(err);
        }
        self.invalidate_tiers(world_id, item_id).await;
        Ok(())
    }

    /// Read path: local tier, then the bounded distributed probe, then the
    /// database. Database results populate both tiers before returning.
    pub async fn retrieve_live(
        &self,
        world_id: i32,
        item_id: i32,
    ) -> Result<Vec<Listing>, sqlx::Error> {
        let key = cache::listing_key(world_id, item_id);

        if let Some(hit) = self.local.get(&key) {
            return Ok(hit.as_ref().clone());
        }

        if let Some(listings) = self.distributed.get(&key).await {
            self.local
                .insert(key, Arc::new(listings.clone()))
                .await;
            return Ok(listings);
        }

        let mut listings = sqlx::query_as::<_, Listing>(
            "SELECT * FROM listing WHERE world_id = $1 AND item_id = $2",
        )
        .bind(world_id)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        sort_listings(&mut listings);

        self.local
            .insert(key.clone(), Arc::new(listings.clone()))
            .await;
        self.distributed.put(key, &listings, DISTRIBUTED_TTL);

        Ok(listings)
    }

    /// One round trip over the cross product of worlds and items. Missing
    /// pairs map to empty sequences; each present pair is re-sorted.
    pub async fn retrieve_many_live(
        &self,
        world_ids: &[i32],
        item_ids: &[i32],
    ) -> Result<HashMap<(i32, i32), Vec<Listing>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Listing>(
            "SELECT * FROM listing WHERE item_id = ANY($1) AND world_id = ANY($2)",
        )
        .bind(item_ids)
        .bind(world_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut result: HashMap<(i32, i32), Vec<Listing>> = HashMap::new();
        for &world_id in world_ids {
            for &item_id in item_ids {
                result.insert((world_id, item_id), Vec::new());
            }
        }
        for row in rows {
            result
                .entry((row.world_id, row.item_id))
                .or_default()
                .push(row);
        }
        for group in result.values_mut() {
            sort_listings(group);
        }

        Ok(result)
    }

    /// Distributed removal is fire-and-forget; the local removal completes
    /// before the write returns, so the writer observes its own write.
    async fn invalidate_tiers(&self, world_id: i32, item_id: i32) {
        let key = cache::listing_key(world_id, item_id);
        self.distributed.invalidate(key.clone());
        self.local.invalidate(&key).await;
    }
}

/// Price-ascending total order, ties broken by `listing_id`.
pub fn sort_listings(listings: &mut [Listing]) {
    listings.sort_by(|a, b| {
        a.unit_price
            .cmp(&b.unit_price)
            .then_with(|| a.listing_id.cmp(&b.listing_id))
    });
}

fn group_by_pair(listings: Vec<Listing>) -> Vec<((i32, i32), Vec<Listing>)> {
    let mut groups: BTreeMap<(i32, i32), Vec<Listing>> = BTreeMap::new();
    for listing in listings {
        groups
            .entry((listing.world_id, listing.item_id))
            .or_default()
            .push(listing);
    }
    groups.into_iter().collect()
}
