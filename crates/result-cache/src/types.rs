//! Cache types

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A cached output artifact
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Statistics about the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}
