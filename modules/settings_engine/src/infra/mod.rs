//! Infrastructure layer - catalog storage, state caching, scratch files

pub mod catalog;
pub mod discovery;
pub mod scratch;

pub use catalog::{CatalogError, StaticSettingsCatalog};
pub use discovery::CachingDiscovery;
