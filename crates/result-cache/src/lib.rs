//! In-memory result cache with TTL expiration
//!
//! Maps a processing key (content fingerprint plus processing flags) to the
//! location of an output artifact on disk. Entries expire after a fixed TTL
//! and are purged opportunistically by [`ResultCache::evict_expired`]; there
//! is no background sweep.

mod cache;
mod types;

pub use cache::ResultCache;
pub use types::CacheStats;
