use super::CacheEntry;
use crate::config::CacheConfig;
use crate::error::FetchError;
use crate::fetch::{no_progress, Fetcher, Progress, VideoMetadata};
use chrono::{DateTime, TimeDelta, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const TRACE_TITLE_LEN: usize = 26;

type Entry<F> = CacheEntry<<F as Fetcher>::Metadata>;

/// Memoizing front for a [`Fetcher`], keyed by video id.
///
/// Entries are trusted until their expiry and replaced wholesale by every new
/// fetch. Callers for the same id are serialised, so a lookup that arrives
/// while another one is fetching waits for it and reuses its result instead
/// of fetching twice. Forced lookups always fetch.
pub struct MetadataCache<F: Fetcher> {
    fetcher: F,
    expiry: TimeDelta,
    store: Mutex<LruCache<String, Entry<F>>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<F: Fetcher> MetadataCache<F> {
    pub fn new(fetcher: F, config: CacheConfig) -> Self {
        let store = match config.capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };

        Self {
            fetcher,
            expiry: TimeDelta::from_std(config.expiry).unwrap_or(TimeDelta::MAX),
            store: Mutex::new(store),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub async fn get_metadata(
        &self,
        id: &str,
        force: bool,
        on_progress: Option<Progress>,
    ) -> Result<Entry<F>, FetchError> {
        if !force {
            if let Some(hit) = self.lookup(id).await {
                return Ok(hit);
            }
        }

        let slot = self.acquire_slot(id).await;
        let result = async {
            let _guard = slot.lock().await;
            // The previous holder may have just stored this id.
            if !force {
                if let Some(hit) = self.lookup(id).await {
                    return Ok(hit);
                }
            }
            self.fetch_and_store(id, on_progress).await
        }
        .await;
        self.release_slot(id, slot).await;

        result
    }

    /// Current entry for `id`, expired or not, without marking it as served.
    pub async fn peek(&self, id: &str) -> Option<Entry<F>> {
        self.store.lock().await.peek(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }

    async fn lookup(&self, id: &str) -> Option<Entry<F>> {
        let mut store = self.store.lock().await;
        let entry = store.get_mut(id)?;
        if entry.is_expired_at(Utc::now()) {
            return None;
        }

        entry.fresh = false;
        debug!(id, title = entry.metadata.title(), "metadata cache hit");
        Some(entry.clone())
    }

    async fn fetch_and_store(
        &self,
        id: &str,
        on_progress: Option<Progress>,
    ) -> Result<Entry<F>, FetchError> {
        let preload = on_progress.is_none();
        let progress = on_progress.unwrap_or_else(no_progress);

        let metadata = match self.fetcher.fetch(id, &progress).await {
            Ok(metadata) => metadata,
            Err(err) if err.is_transient() => {
                warn!(id, error = %err, "retrying failed metadata fetch");
                self.fetcher
                    .fetch(id, &progress)
                    .await
                    .map_err(|source| FetchError::RetryExhausted {
                        id: id.to_string(),
                        source: Box::new(source),
                    })?
            }
            Err(err) => return Err(err),
        };

        let entry = CacheEntry {
            id: id.to_string(),
            expiry: self.expiry_for(Utc::now(), &metadata),
            metadata: Arc::new(metadata),
            fresh: true,
        };
        self.store.lock().await.put(id.to_string(), entry.clone());

        debug!(
            id,
            video_id = entry.metadata.video_id(),
            title = %trace_title(entry.metadata.title()),
            preload,
            "got new metadata"
        );
        Ok(entry)
    }

    // Never later than the configured window; earlier if the source says so.
    fn expiry_for(&self, now: DateTime<Utc>, metadata: &F::Metadata) -> DateTime<Utc> {
        let window = now
            .checked_add_signed(self.expiry)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        match metadata.expires_at() {
            Some(at) if at < window => at,
            _ => window,
        }
    }

    async fn acquire_slot(&self, id: &str) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(id.to_string()).or_default())
    }

    async fn release_slot(&self, id: &str, slot: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        drop(slot);
        if in_flight
            .get(id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            in_flight.remove(id);
        }
    }
}

fn trace_title(title: &str) -> String {
    title.chars().take(TRACE_TITLE_LEN).collect()
}
