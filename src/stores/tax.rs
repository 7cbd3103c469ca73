//! Per-world tax rates, stored as a redis hash under `tax:{world}`.

use redis::aio::ConnectionManager;

use crate::cache::tax_key;
use crate::entities::TaxRates;

const FIELDS: [&str; 9] = [
    "limsa_lominsa",
    "gridania",
    "uldah",
    "ishgard",
    "kugane",
    "crystarium",
    "old_sharlayan",
    "tuliyollal",
    "source",
];

pub struct TaxRatesStore {
    conn: ConnectionManager,
}

impl TaxRatesStore {
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Writes all fields of a world's hash in one command.
    pub async fn update(&self, world_id: i32, rates: &TaxRates) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("HSET")
            .arg(tax_key(world_id))
            .arg(FIELDS[0])
            .arg(rates.limsa_lominsa)
            .arg(FIELDS[1])
            .arg(rates.gridania)
            .arg(FIELDS[2])
            .arg(rates.uldah)
            .arg(FIELDS[3])
            .arg(rates.ishgard)
            .arg(FIELDS[4])
            .arg(rates.kugane)
            .arg(FIELDS[5])
            .arg(rates.crystarium)
            .arg(FIELDS[6])
            .arg(rates.old_sharlayan)
            .arg(FIELDS[7])
            .arg(rates.tuliyollal)
            .arg(FIELDS[8])
            .arg(&rates.source)
            .query_async(&mut conn)
            .await
    }

    /// Reads every field in one round trip; a world with no hash yields
    /// `None`.
    pub async fn retrieve(&self, world_id: i32) -> redis::RedisResult<Option<TaxRates>> {
        let mut conn = self.conn.clone();
        let (
            limsa_lominsa,
            gridania,
            uldah,
            ishgard,
            kugane,
            crystarium,
            old_sharlayan,
            tuliyollal,
            source,
        ): (
            Option<i32>,
            Option<i32>,
            Option<i32>,
            Option<i32>,
            Option<i32>,
            Option<i32>,
            Option<i32>,
            Option<i32>,
            Option<String>,
        ) = redis::cmd("HMGET")
            .arg(tax_key(world_id))
            .arg(&FIELDS[..])
            .query_async(&mut conn)
            .await?;

        if source.is_none() && limsa_lominsa.is_none() {
            return Ok(None);
        }

        Ok(Some(TaxRates {
            limsa_lominsa: limsa_lominsa.unwrap_or(0),
            gridania: gridania.unwrap_or(0),
            uldah: uldah.unwrap_or(0),
            ishgard: ishgard.unwrap_or(0),
            kugane: kugane.unwrap_or(0),
            crystarium: crystarium.unwrap_or(0),
            old_sharlayan: old_sharlayan.unwrap_or(0),
            tuliyollal: tuliyollal.unwrap_or(0),
            source: source.unwrap_or_default(),
        }))
    }
}
