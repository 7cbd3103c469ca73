//! Upload ingestion: body schema, structural validation, and the ordered
//! behavior pipeline.

use std::sync::Arc;

use serde::Deserialize;

use crate::entities::Materia;
use crate::error::ApiError;
use crate::stores::{Blacklist, TrustedSourceRegistry};
use crate::util::sha256_hex;

pub mod behaviors;

pub use behaviors::UploadBehavior;

/// A client upload. Everything beyond `uploader_id` is optional; the
/// behaviors decide what applies.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadBody {
    pub world_id: Option<i32>,
    pub item_id: Option<i32>,
    pub uploader_id: String,
    pub listings: Option<Vec<UploadListing>>,
    pub entries: Option<Vec<UploadSale>>,
    pub tax_rates: Option<UploadTaxRates>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadListing {
    pub listing_id: String,
    pub hq: bool,
    pub on_mannequin: bool,
    #[serde(default)]
    pub materia: Vec<Materia>,
    pub price_per_unit: i32,
    pub quantity: i32,
    pub dye_id: i32,
    pub creator_id: String,
    pub creator_name: String,
    pub last_review_time: i64,
    pub retainer_id: String,
    pub retainer_name: String,
    pub retainer_city_id: i32,
    pub seller_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSale {
    pub hq: bool,
    pub price_per_unit: i32,
    pub quantity: i32,
    pub buyer_name: String,
    pub sold_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadTaxRates {
    pub limsa: Option<i32>,
    pub gridania: Option<i32>,
    pub uldah: Option<i32>,
    pub ishgard: Option<i32>,
    pub kugane: Option<i32>,
    pub crystarium: Option<i32>,
    pub old_sharlayan: Option<i32>,
    pub tuliyollal: Option<i32>,
}

/// Structural validation, applied after authentication and before any side
/// effect.
pub fn validate(body: &UploadBody) -> Result<(), String> {
    if body.uploader_id.trim().is_empty() {
        return Err("uploader_id is required".into());
    }
    if let Some(listings) = &body.listings {
        if body.world_id.is_none() || body.item_id.is_none() {
            return Err("listings require world_id and item_id".into());
        }
        for listing in listings {
            if listing.price_per_unit < 1 {
                return Err(format!(
                    "listing {} has a non-positive price",
                    listing.listing_id
                ));
            }
            if listing.quantity < 1 {
                return Err(format!(
                    "listing {} has a non-positive quantity",
                    listing.listing_id
                ));
            }
        }
    }
    if let Some(entries) = &body.entries {
        if body.world_id.is_none() || body.item_id.is_none() {
            return Err("entries require world_id and item_id".into());
        }
        for entry in entries {
            if entry.price_per_unit < 1 || entry.quantity < 1 {
                return Err("sale entries require positive price and quantity".into());
            }
        }
    }
    if body.tax_rates.is_some() && body.world_id.is_none() {
        return Err("tax_rates require world_id".into());
    }
    Ok(())
}

/// Runs an upload through the ordered behavior chain.
///
/// Per upload: authenticate, validate, hash the uploader, short-circuit on a
/// flagged hash, then execute each triggered behavior in order. Fail-fast
/// with partial commit: earlier behaviors are not rolled back when a later
/// one fails, and the first error is the response.
pub struct UploadPipeline {
    trusted: Arc<TrustedSourceRegistry>,
    blacklist: Arc<Blacklist>,
    behaviors: Vec<Box<dyn UploadBehavior>>,
}

impl UploadPipeline {
    pub fn new(
        trusted: Arc<TrustedSourceRegistry>,
        blacklist: Arc<Blacklist>,
        behaviors: Vec<Box<dyn UploadBehavior>>,
    ) -> Self {
        Self {
            trusted,
            blacklist,
            behaviors,
        }
    }

    pub async fn process(&self, api_key: &str, body: UploadBody) -> Result<(), ApiError> {
        let source = self
            .trusted
            .get(api_key)
            .await?
            .ok_or(ApiError::Forbidden)?;

        validate(&body).map_err(ApiError::BadRequest)?;

        let uploader_hash = sha256_hex(&body.uploader_id);
        if self.blacklist.has(&uploader_hash).await {
            // Flagged uploads report success with every side effect
            // suppressed.
            return Ok(());
        }

        for behavior in &self.behaviors {
            if behavior.should_execute(&body) {
                behavior.execute(&source, &body).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{validate, UploadBody, UploadListing, UploadSale, UploadTaxRates};

    fn body() -> UploadBody {
        UploadBody {
            world_id: Some(23),
            item_id: Some(5057),
            uploader_id: "uploader".into(),
            listings: None,
            entries: None,
            tax_rates: None,
        }
    }

    fn upload_listing(price_per_unit: i32, quantity: i32) -> UploadListing {
        UploadListing {
            listing_id: "A".into(),
            hq: false,
            on_mannequin: false,
            materia: Vec::new(),
            price_per_unit,
            quantity,
            dye_id: 0,
            creator_id: String::new(),
            creator_name: String::new(),
            last_review_time: 1_700_000_000,
            retainer_id: String::new(),
            retainer_name: String::new(),
            retainer_city_id: 0,
            seller_id: String::new(),
        }
    }

    #[test]
    fn accepts_a_minimal_upload() {
        assert!(validate(&body()).is_ok());
    }

    #[test]
    fn rejects_missing_uploader() {
        let mut body = body();
        body.uploader_id = "  ".into();
        assert!(validate(&body).is_err());
    }

    #[test]
    fn rejects_non_positive_prices_and_quantities() {
        let mut body = body();
        body.listings = Some(vec![upload_listing(0, 1)]);
        assert!(validate(&body).is_err());

        body.listings = Some(vec![upload_listing(1, 0)]);
        assert!(validate(&body).is_err());

        body.listings = Some(vec![upload_listing(1, 1)]);
        assert!(validate(&body).is_ok());
    }

    #[test]
    fn rejects_listings_without_world_or_item() {
        let mut body = body();
        body.world_id = None;
        body.listings = Some(vec![upload_listing(1, 1)]);
        assert!(validate(&body).is_err());
    }

    #[test]
    fn rejects_invalid_sale_entries() {
        let mut body = body();
        body.entries = Some(vec![UploadSale {
            hq: false,
            price_per_unit: 0,
            quantity: 1,
            buyer_name: "B".into(),
            sold_at: 1_700_000_000,
        }]);
        assert!(validate(&body).is_err());
    }

    #[test]
    fn rejects_tax_rates_without_world() {
        let mut body = body();
        body.world_id = None;
        body.tax_rates = Some(UploadTaxRates::default());
        assert!(validate(&body).is_err());
    }
}
