#![forbid(unsafe_code)]
#![deny(clippy::missing_const_for_fn)]
#![deny(clippy::nursery)]
#![deny(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;

pub use sqlx::PgPool;

pub mod aggregate;
pub mod cache;
pub mod db;
pub mod entities;
pub mod error;
pub mod routes;
pub mod stores;
pub mod upload;
pub mod util;
pub mod world;

use aggregate::Aggregator;
use stores::{Blacklist, ListingStore, SalesStore, TaxRatesStore, TrustedSourceRegistry, UploadCountStore};
use upload::UploadPipeline;
use world::WorldDcResolver;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub resolver: Arc<WorldDcResolver>,
    pub listings: Arc<ListingStore>,
    pub sales: Arc<SalesStore>,
    pub tax_rates: Arc<TaxRatesStore>,
    pub trusted: Arc<TrustedSourceRegistry>,
    pub blacklist: Arc<Blacklist>,
    pub upload_counts: Arc<UploadCountStore>,
    pub pipeline: Arc<UploadPipeline>,
    pub aggregator: Arc<Aggregator>,
}
