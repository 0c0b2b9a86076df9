mod metadata_cache;

pub use metadata_cache::*;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Signed stream URLs stop working after roughly six hours.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(6 * 3600);

/// Fetched metadata plus the bookkeeping the cache attaches to it.
#[derive(Debug)]
pub struct CacheEntry<M> {
    pub id: String,
    pub metadata: Arc<M>,
    pub expiry: DateTime<Utc>,
    /// True only on the answer to the call that fetched it.
    pub fresh: bool,
}

impl<M> CacheEntry<M> {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

impl<M> Clone for CacheEntry<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            metadata: Arc::clone(&self.metadata),
            expiry: self.expiry,
            fresh: self.fresh,
        }
    }
}
