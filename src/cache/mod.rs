//! Cache module for storing resolved ratings
//!
//! `RatingCache` keeps a bounded, time-expiring map of normalized wine names to
//! ratings. It persists through any `KeyValueStore`: `MemoryStore` for tests and
//! embedders, `FileStore` for an on-disk cache in the platform cache directory.

mod rating_cache;
mod store;

pub use rating_cache::RatingCache;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
