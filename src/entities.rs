use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// A single slotted augmentation attached to a listing. Order matters and is
/// preserved through the jsonb round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Materia {
    pub slot_id: i32,
    pub materia_id: i32,
}

/// A live market board offer for one (world, item) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub listing_id: String,
    pub item_id: i32,
    pub world_id: i32,
    pub hq: bool,
    pub on_mannequin: bool,
    pub materia: Json<Vec<Materia>>,
    pub unit_price: i32,
    pub quantity: i32,
    pub dye_id: i32,
    pub creator_id: String,
    pub creator_name: String,
    pub last_review_time: DateTime<Utc>,
    pub retainer_id: String,
    pub retainer_name: String,
    pub retainer_city_id: i32,
    pub seller_id: String,
    pub uploaded_at: DateTime<Utc>,
    pub source: String,
}

/// A completed purchase. Append-only; read newest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sale {
    pub world_id: i32,
    pub item_id: i32,
    pub hq: bool,
    pub unit_price: i32,
    pub quantity: i32,
    pub buyer_name: String,
    pub sold_at: DateTime<Utc>,
}

/// Per-world market tax rates, one integer per city, plus the name of the
/// application that uploaded them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxRates {
    pub limsa_lominsa: i32,
    pub gridania: i32,
    pub uldah: i32,
    pub ishgard: i32,
    pub kugane: i32,
    pub crystarium: i32,
    pub old_sharlayan: i32,
    pub tuliyollal: i32,
    pub source: String,
}

/// Rolling 30-day upload counters. `counts[0]` is today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCountHistory {
    pub last_push: DateTime<Utc>,
    pub counts: Vec<i64>,
}

/// An authenticated uploading application. Only the sha512 of its API key is
/// ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrustedSource {
    pub api_key_hash: String,
    pub name: String,
    pub upload_count: i64,
}

/// A game shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub id: i32,
    pub name: String,
}

/// A named grouping of worlds sharing market infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenter {
    pub name: String,
    pub region: String,
    pub world_ids: BTreeSet<i32>,
}

/// A coarse geographic grouping of data centers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: u8,
    pub name: String,
}
