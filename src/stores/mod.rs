pub mod blacklist;
pub mod listing;
pub mod sale;
pub mod tax;
pub mod trusted;
pub mod upload_count;

pub use blacklist::Blacklist;
pub use listing::ListingStore;
pub use sale::SalesStore;
pub use tax::TaxRatesStore;
pub use trusted::TrustedSourceRegistry;
pub use upload_count::UploadCountStore;
