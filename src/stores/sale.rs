//! Append-only sale history. Reads are rare next to listing reads, so this
//! store is uncached.

use sqlx::PgPool;
use tracing::error;

use crate::entities::Sale;

const INSERT_SALE: &str = "INSERT INTO sale
        (world_id, item_id, sold_at, unit_price, quantity, buyer_name, hq)
    VALUES ($1,$2,$3,$4,$5,$6,$7)
    ON CONFLICT (world_id, item_id, sold_at, unit_price, quantity, buyer_name) DO NOTHING";

pub struct SalesStore {
    pool: PgPool,
}

impl SalesStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts each sale once; rows matching the dedup key are ignored so
    /// replays are idempotent.
    pub async fn append(
        &self,
        world_id: i32,
        item_id: i32,
        sales: &[Sale],
    ) -> Result<(), sqlx::Error> {
        if sales.is_empty() {
            return Ok(());
        }
        if let Err(err) = self.append_tx(world_id, item_id, sales).await {
            error!(world_id, item_id, error = %err, "sale append failed");
            return Err(err);
        }
        Ok(())
    }

    async fn append_tx(
        &self,
        world_id: i32,
        item_id: i32,
        sales: &[Sale],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for sale in sales {
            sqlx::query(INSERT_SALE)
                .bind(world_id)
                .bind(item_id)
                .bind(sale.sold_at)
                .bind(sale.unit_price)
                .bind(sale.quantity)
                .bind(&sale.buyer_name)
                .bind(sale.hq)
                .execute(&mut tx)
                .await?;
        }
        tx.commit().await
    }

    /// Newest-first history for one pair, bounded by `limit`.
    pub async fn recent(
        &self,
        world_id: i32,
        item_id: i32,
        limit: i64,
    ) -> Result<Vec<Sale>, sqlx::Error> {
        sqlx::query_as::<_, Sale>(
            "SELECT * FROM sale WHERE world_id = $1 AND item_id = $2
             ORDER BY sold_at DESC LIMIT $3",
        )
        .bind(world_id)
        .bind(item_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Newest-first history across a set of worlds in one round trip.
    pub async fn recent_many(
        &self,
        world_ids: &[i32],
        item_id: i32,
        limit: i64,
    ) -> Result<Vec<Sale>, sqlx::Error> {
        sqlx::query_as::<_, Sale>(
            "SELECT * FROM sale WHERE item_id = $1 AND world_id = ANY($2)
             ORDER BY sold_at DESC LIMIT $3",
        )
        .bind(item_id)
        .bind(world_ids)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
