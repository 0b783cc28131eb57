pub mod catalog;
pub mod session;

pub use catalog::{CatalogCache, CatalogCacheSettings, CatalogEntry, CatalogError};
pub use session::SessionStore;
