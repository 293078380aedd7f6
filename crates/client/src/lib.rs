//! HTTP collaborators for the configurator: catalog reads, exchange rates and
//! order submission.

pub mod catalog;
pub mod currency;
pub mod orders;

pub use catalog::{CatalogService, CatalogSource, HttpCatalogSource};
pub use currency::HttpRateSource;
pub use orders::HttpOrderClient;
