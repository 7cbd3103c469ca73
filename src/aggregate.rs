//! Combines per-world listings and sales into per-world or per-data-center
//! views.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::{Listing, Sale};
use crate::error::ApiError;
use crate::stores::listing::sort_listings;
use crate::stores::{ListingStore, SalesStore};
use crate::world::{WorldDcResolver, WorldOrDc};

#[derive(Debug, Serialize)]
pub struct ListingView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(flatten)]
    pub listing: Listing,
}

#[derive(Debug, Serialize)]
pub struct CurrentlyShownView {
    pub item_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_name: Option<String>,
    pub last_upload_time: Option<DateTime<Utc>>,
    pub listings: Vec<ListingView>,
}

#[derive(Debug, Serialize)]
pub struct SaleView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(flatten)]
    pub sale: Sale,
}

#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub item_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_name: Option<String>,
    pub entries: Vec<SaleView>,
}

pub struct Aggregator {
    resolver: Arc<WorldDcResolver>,
    listings: Arc<ListingStore>,
    sales: Arc<SalesStore>,
}

impl Aggregator {
    pub const fn new(
        resolver: Arc<WorldDcResolver>,
        listings: Arc<ListingStore>,
        sales: Arc<SalesStore>,
    ) -> Self {
        Self {
            resolver,
            listings,
            sales,
        }
    }

    /// Resolves the token and fetches listings: once for a world, fanned out
    /// and merged price-ascending for a data center.
    pub async fn listings_view(
        &self,
        item_id: i32,
        token: &str,
    ) -> Result<CurrentlyShownView, ApiError> {
        match self.resolver.resolve(token).ok_or(ApiError::NotFound)? {
            WorldOrDc::World(world) => {
                let listings = self.listings.retrieve_live(world.id, item_id).await?;
                let last_upload_time = listings.iter().map(|l| l.uploaded_at).max();
                Ok(CurrentlyShownView {
                    item_id,
                    world_id: Some(world.id),
                    world_name: Some(world.name),
                    dc_name: None,
                    last_upload_time,
                    listings: listings
                        .into_iter()
                        .map(|listing| ListingView {
                            world_name: None,
                            listing,
                        })
                        .collect(),
                })
            }
            WorldOrDc::Dc(dc) => {
                let world_ids: Vec<i32> = dc.world_ids.iter().copied().collect();
                let mut groups = self
                    .listings
                    .retrieve_many_live(&world_ids, &[item_id])
                    .await?;

                let mut merged = Vec::new();
                for &world_id in &world_ids {
                    merged.extend(groups.remove(&(world_id, item_id)).unwrap_or_default());
                }
                sort_listings(&mut merged);

                let last_upload_time = merged.iter().map(|l| l.uploaded_at).max();
                let listings = merged
                    .into_iter()
                    .map(|listing| ListingView {
                        world_name: self.world_name(listing.world_id),
                        listing,
                    })
                    .collect();

                Ok(CurrentlyShownView {
                    item_id,
                    world_id: None,
                    world_name: None,
                    dc_name: Some(dc.name),
                    last_upload_time,
                    listings,
                })
            }
        }
    }

    /// Resolves the token and fetches sale history, merged newest-first.
    pub async fn sales_view(
        &self,
        item_id: i32,
        token: &str,
        limit: i64,
    ) -> Result<HistoryView, ApiError> {
        match self.resolver.resolve(token).ok_or(ApiError::NotFound)? {
            WorldOrDc::World(world) => {
                let sales = self.sales.recent(world.id, item_id, limit).await?;
                Ok(HistoryView {
                    item_id,
                    world_id: Some(world.id),
                    world_name: Some(world.name),
                    dc_name: None,
                    entries: sales
                        .into_iter()
                        .map(|sale| SaleView {
                            world_name: None,
                            sale,
                        })
                        .collect(),
                })
            }
            WorldOrDc::Dc(dc) => {
                let world_ids: Vec<i32> = dc.world_ids.iter().copied().collect();
                let sales = merge_sales(self.sales.recent_many(&world_ids, item_id, limit).await?);
                Ok(HistoryView {
                    item_id,
                    world_id: None,
                    world_name: None,
                    dc_name: Some(dc.name),
                    entries: sales
                        .into_iter()
                        .map(|sale| SaleView {
                            world_name: self.world_name(sale.world_id),
                            sale,
                        })
                        .collect(),
                })
            }
        }
    }

    /// Reads tolerate historical rows whose world left the catalog.
    fn world_name(&self, world_id: i32) -> Option<String> {
        self.resolver.worlds_by_id().get(&world_id).cloned()
    }
}

fn merge_sales(mut sales: Vec<Sale>) -> Vec<Sale> {
    sales.sort_by(|a, b| b.sold_at.cmp(&a.sold_at));
    sales
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sqlx::types::Json;

    use super::merge_sales;
    use crate::entities::{Listing, Sale};
    use crate::stores::listing::sort_listings;

    fn listing(listing_id: &str, world_id: i32, unit_price: i32) -> Listing {
        Listing {
            listing_id: listing_id.into(),
            item_id: 5057,
            world_id,
            hq: false,
            on_mannequin: false,
            materia: Json(Vec::new()),
            unit_price,
            quantity: 1,
            dye_id: 0,
            creator_id: String::new(),
            creator_name: String::new(),
            last_review_time: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            retainer_id: String::new(),
            retainer_name: String::new(),
            retainer_city_id: 0,
            seller_id: String::new(),
            uploaded_at: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            source: String::new(),
        }
    }

    fn sale(world_id: i32, sold_at: i64) -> Sale {
        Sale {
            world_id,
            item_id: 5057,
            hq: false,
            unit_price: 100,
            quantity: 1,
            buyer_name: "B".into(),
            sold_at: chrono::Utc.timestamp_opt(sold_at, 0).unwrap(),
        }
    }

    #[test]
    fn dc_merge_orders_across_worlds_by_price() {
        let mut merged = vec![listing("A", 23, 80), listing("B", 24, 60)];
        sort_listings(&mut merged);
        assert_eq!(merged[0].world_id, 24);
        assert_eq!(merged[0].unit_price, 60);
        assert_eq!(merged[1].world_id, 23);
        assert_eq!(merged[1].unit_price, 80);
    }

    #[test]
    fn sales_merge_newest_first() {
        let merged = merge_sales(vec![
            sale(23, 1_700_000_000),
            sale(24, 1_700_000_500),
            sale(23, 1_699_999_000),
        ]);
        let times: Vec<i64> = merged.iter().map(|s| s.sold_at.timestamp()).collect();
        assert_eq!(times, vec![1_700_000_500, 1_700_000_000, 1_699_999_000]);
    }
}
