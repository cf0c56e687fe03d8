//! Disk cache for fetched and transformed image artifacts
//!
//! The cache is a flat directory of artifacts named by derived cache keys.
//! Writes publish atomically; reads that fail are treated as soft misses by
//! the load path. Removal by locator is a prefix scan, since every variant
//! of one source shares the locator's digest prefix.

mod config;
mod store;

pub use config::CacheConfig;
pub use store::{CacheStats, CacheStore};
