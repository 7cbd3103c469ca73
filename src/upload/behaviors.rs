//! The behaviors composed into the upload pipeline, in execution order:
//! listings, sales, tax rates, source counter, daily counter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::types::Json;
use tracing::warn;

use super::{UploadBody, UploadListing, UploadSale, UploadTaxRates};
use crate::entities::{Listing, Sale, TaxRates, TrustedSource};
use crate::error::ApiError;
use crate::stores::{
    ListingStore, SalesStore, TaxRatesStore, TrustedSourceRegistry, UploadCountStore,
};

#[async_trait]
pub trait UploadBehavior: Send + Sync {
    fn should_execute(&self, body: &UploadBody) -> bool;
    async fn execute(&self, source: &TrustedSource, body: &UploadBody) -> Result<(), ApiError>;
}

pub fn default_behaviors(
    listings: Arc<ListingStore>,
    sales: Arc<SalesStore>,
    tax_rates: Arc<TaxRatesStore>,
    trusted: Arc<TrustedSourceRegistry>,
    upload_counts: Arc<UploadCountStore>,
) -> Vec<Box<dyn UploadBehavior>> {
    vec![
        Box::new(ListingsBehavior { store: listings }),
        Box::new(SalesBehavior { store: sales }),
        Box::new(TaxRatesBehavior { store: tax_rates }),
        Box::new(TrustedSourceIncrementBehavior { registry: trusted }),
        Box::new(DailyUploadIncrementBehavior {
            store: upload_counts,
        }),
    ]
}

pub struct ListingsBehavior {
    store: Arc<ListingStore>,
}

#[async_trait]
impl UploadBehavior for ListingsBehavior {
    fn should_execute(&self, body: &UploadBody) -> bool {
        body.listings.is_some() && body.world_id.is_some()
    }

    async fn execute(&self, source: &TrustedSource, body: &UploadBody) -> Result<(), ApiError> {
        let (Some(world_id), Some(item_id)) = (body.world_id, body.item_id) else {
            return Ok(());
        };
        let uploads = body.listings.as_deref().unwrap_or_default();

        // An empty replace clears the pair.
        if uploads.is_empty() {
            return Ok(self.store.delete_live(world_id, item_id).await?);
        }

        let mut listings = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let listing = to_listing(world_id, item_id, &source.name, upload)
                .ok_or_else(|| ApiError::BadRequest("invalid last_review_time".into()))?;
            listings.push(listing);
        }
        Ok(self.store.replace_live(listings).await?)
    }
}

pub struct SalesBehavior {
    store: Arc<SalesStore>,
}

#[async_trait]
impl UploadBehavior for SalesBehavior {
    fn should_execute(&self, body: &UploadBody) -> bool {
        body.entries.is_some()
    }

    async fn execute(&self, _source: &TrustedSource, body: &UploadBody) -> Result<(), ApiError> {
        let (Some(world_id), Some(item_id)) = (body.world_id, body.item_id) else {
            return Ok(());
        };
        let entries = body.entries.as_deref().unwrap_or_default();

        let mut sales = Vec::with_capacity(entries.len());
        for entry in entries {
            let sale = to_sale(world_id, item_id, entry)
                .ok_or_else(|| ApiError::BadRequest("invalid sold_at".into()))?;
            sales.push(sale);
        }
        Ok(self.store.append(world_id, item_id, &sales).await?)
    }
}

pub struct TaxRatesBehavior {
    store: Arc<TaxRatesStore>,
}

#[async_trait]
impl UploadBehavior for TaxRatesBehavior {
    fn should_execute(&self, body: &UploadBody) -> bool {
        body.tax_rates.is_some() && body.world_id.is_some()
    }

    async fn execute(&self, source: &TrustedSource, body: &UploadBody) -> Result<(), ApiError> {
        let (Some(world_id), Some(uploaded)) = (body.world_id, body.tax_rates.as_ref()) else {
            return Ok(());
        };

        let existing = match self.store.retrieve(world_id).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(world_id, error = %err, "tax rate read failed");
                None
            }
        };
        let merged = merge_tax_rates(uploaded, existing.as_ref(), &source.name);

        // Fire-and-forget tolerated: a lost tax write never fails the upload.
        if let Err(err) = self.store.update(world_id, &merged).await {
            warn!(world_id, error = %err, "tax rate update failed");
        }
        Ok(())
    }
}

pub struct TrustedSourceIncrementBehavior {
    registry: Arc<TrustedSourceRegistry>,
}

#[async_trait]
impl UploadBehavior for TrustedSourceIncrementBehavior {
    fn should_execute(&self, _body: &UploadBody) -> bool {
        true
    }

    async fn execute(&self, source: &TrustedSource, _body: &UploadBody) -> Result<(), ApiError> {
        Ok(self.registry.increment(&source.api_key_hash).await?)
    }
}

pub struct DailyUploadIncrementBehavior {
    store: Arc<UploadCountStore>,
}

#[async_trait]
impl UploadBehavior for DailyUploadIncrementBehavior {
    fn should_execute(&self, _body: &UploadBody) -> bool {
        true
    }

    async fn execute(&self, _source: &TrustedSource, _body: &UploadBody) -> Result<(), ApiError> {
        Ok(self.store.increment().await?)
    }
}

fn to_listing(
    world_id: i32,
    item_id: i32,
    source_name: &str,
    upload: &UploadListing,
) -> Option<Listing> {
    let last_review_time = Utc.timestamp_opt(upload.last_review_time, 0).single()?;
    Some(Listing {
        listing_id: upload.listing_id.clone(),
        item_id,
        world_id,
        hq: upload.hq,
        on_mannequin: upload.on_mannequin,
        materia: Json(upload.materia.clone()),
        unit_price: upload.price_per_unit,
        quantity: upload.quantity,
        dye_id: upload.dye_id,
        creator_id: upload.creator_id.clone(),
        creator_name: upload.creator_name.clone(),
        last_review_time,
        retainer_id: upload.retainer_id.clone(),
        retainer_name: upload.retainer_name.clone(),
        retainer_city_id: upload.retainer_city_id,
        seller_id: upload.seller_id.clone(),
        // stamped per batch by the store
        uploaded_at: Utc::now(),
        source: source_name.to_string(),
    })
}

fn to_sale(world_id: i32, item_id: i32, entry: &UploadSale) -> Option<Sale> {
    let sold_at = Utc.timestamp_opt(entry.sold_at, 0).single()?;
    Some(Sale {
        world_id,
        item_id,
        hq: entry.hq,
        unit_price: entry.price_per_unit,
        quantity: entry.quantity,
        buyer_name: entry.buyer_name.clone(),
        sold_at,
    })
}

/// Field-wise merge: the uploaded value wins, else the existing one, else 0.
/// The source name always reflects the latest uploader.
fn merge_tax_rates(
    uploaded: &UploadTaxRates,
    existing: Option<&TaxRates>,
    source: &str,
) -> TaxRates {
    let base = existing.cloned().unwrap_or_default();
    TaxRates {
        limsa_lominsa: uploaded.limsa.unwrap_or(base.limsa_lominsa),
        gridania: uploaded.gridania.unwrap_or(base.gridania),
        uldah: uploaded.uldah.unwrap_or(base.uldah),
        ishgard: uploaded.ishgard.unwrap_or(base.ishgard),
        kugane: uploaded.kugane.unwrap_or(base.kugane),
        crystarium: uploaded.crystarium.unwrap_or(base.crystarium),
        old_sharlayan: uploaded.old_sharlayan.unwrap_or(base.old_sharlayan),
        tuliyollal: uploaded.tuliyollal.unwrap_or(base.tuliyollal),
        source: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Materia;

    #[test]
    fn merge_prefers_uploaded_then_existing_then_zero() {
        let existing = TaxRates {
            limsa_lominsa: 5,
            gridania: 5,
            uldah: 3,
            ..TaxRates::default()
        };
        let uploaded = UploadTaxRates {
            gridania: Some(4),
            ..UploadTaxRates::default()
        };
        let merged = merge_tax_rates(&uploaded, Some(&existing), "X");
        assert_eq!(merged.limsa_lominsa, 5);
        assert_eq!(merged.gridania, 4);
        assert_eq!(merged.uldah, 3);
        assert_eq!(merged.ishgard, 0);
        assert_eq!(merged.source, "X");
    }

    #[test]
    fn merge_without_existing_defaults_to_zero() {
        let uploaded = UploadTaxRates {
            limsa: Some(7),
            ..UploadTaxRates::default()
        };
        let merged = merge_tax_rates(&uploaded, None, "X");
        assert_eq!(merged.limsa_lominsa, 7);
        assert_eq!(merged.gridania, 0);
    }

    #[test]
    fn listing_conversion_preserves_materia_order() {
        let upload = UploadListing {
            listing_id: "A".into(),
            hq: true,
            on_mannequin: false,
            materia: vec![
                Materia {
                    slot_id: 0,
                    materia_id: 41,
                },
                Materia {
                    slot_id: 1,
                    materia_id: 7,
                },
            ],
            price_per_unit: 100,
            quantity: 1,
            dye_id: 0,
            creator_id: String::new(),
            creator_name: String::new(),
            last_review_time: 1_700_000_000,
            retainer_id: String::new(),
            retainer_name: String::new(),
            retainer_city_id: 0,
            seller_id: String::new(),
        };
        let listing = to_listing(23, 5057, "X", &upload).unwrap();
        assert_eq!(listing.materia.0[0].materia_id, 41);
        assert_eq!(listing.materia.0[1].materia_id, 7);
        assert_eq!(listing.source, "X");
    }

    #[test]
    fn conversions_reject_out_of_range_timestamps() {
        let entry = UploadSale {
            hq: false,
            price_per_unit: 1,
            quantity: 1,
            buyer_name: "B".into(),
            sold_at: i64::MAX,
        };
        assert!(to_sale(23, 5057, &entry).is_none());
    }

    #[tokio::test]
    async fn behavior_triggers_follow_presence() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/markethub").unwrap();
        let sales = SalesBehavior {
            store: Arc::new(SalesStore::new(pool.clone())),
        };
        let counter = DailyUploadIncrementBehavior {
            store: Arc::new(UploadCountStore::new(pool)),
        };

        let mut body = UploadBody {
            world_id: Some(23),
            item_id: Some(5057),
            uploader_id: "u".into(),
            listings: None,
            entries: None,
            tax_rates: None,
        };
        assert!(!sales.should_execute(&body));
        assert!(counter.should_execute(&body));

        body.entries = Some(Vec::new());
        assert!(sales.should_execute(&body));
    }
}
