use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use video_meta_cache::{CacheConfig, FetchError, Fetcher, MetadataCache, Progress, VideoMetadata};

#[derive(Debug)]
struct Meta {
    id: String,
    title: String,
}

impl VideoMetadata for Meta {
    fn video_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

enum Outcome {
    Ok,
    Transient,
    Io,
}

/// Counts calls and plays back scripted outcomes; succeeds once the script runs out.
#[derive(Default)]
struct ScriptedFetcher {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Outcome>>,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    fn with_script(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    type Metadata = Meta;

    async fn fetch(&self, id: &str, on_progress: &Progress) -> Result<Meta, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        on_progress(&format!("fetching {id}"));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Outcome::Ok);
        match outcome {
            Outcome::Ok => Ok(Meta {
                id: id.to_string(),
                title: format!("{id} take {n}"),
            }),
            Outcome::Transient => Err(FetchError::Source {
                id: id.to_string(),
                message: "ERROR: unable to extract player response".into(),
            }),
            Outcome::Io => Err(FetchError::Io {
                id: id.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            }),
        }
    }
}

fn cache(fetcher: ScriptedFetcher) -> MetadataCache<ScriptedFetcher> {
    MetadataCache::new(fetcher, CacheConfig::default())
}

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
    let cache = cache(ScriptedFetcher::default());

    let first = cache.get_metadata("abc", false, None).await.unwrap();
    let second = cache.get_metadata("abc", false, None).await.unwrap();

    assert!(first.fresh);
    assert!(!second.fresh);
    assert_eq!(second.metadata.title, "abc take 1");
    assert!(Arc::ptr_eq(&first.metadata, &second.metadata));
    assert_eq!(cache.fetcher().calls(), 1);
}

#[tokio::test]
async fn different_ids_are_cached_separately() {
    let cache = cache(ScriptedFetcher::default());

    cache.get_metadata("a", false, None).await.unwrap();
    cache.get_metadata("b", false, None).await.unwrap();
    cache.get_metadata("a", false, None).await.unwrap();

    assert_eq!(cache.fetcher().calls(), 2);
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn force_always_fetches_and_overwrites() {
    let cache = cache(ScriptedFetcher::default());

    cache.get_metadata("abc", false, None).await.unwrap();
    let forced = cache.get_metadata("abc", true, None).await.unwrap();
    let forced_again = cache.get_metadata("abc", true, None).await.unwrap();

    assert!(forced.fresh);
    assert!(forced_again.fresh);
    assert_eq!(forced_again.metadata.title, "abc take 3");
    assert_eq!(cache.fetcher().calls(), 3);

    let cached = cache.get_metadata("abc", false, None).await.unwrap();
    assert!(!cached.fresh);
    assert_eq!(cached.metadata.title, "abc take 3");
    assert_eq!(cache.fetcher().calls(), 3);
}

#[tokio::test]
async fn overwrite_keeps_a_single_entry_with_latest_metadata() {
    let cache = cache(ScriptedFetcher::default());

    cache.get_metadata("abc", true, None).await.unwrap();
    cache.get_metadata("abc", true, None).await.unwrap();

    assert_eq!(cache.len().await, 1);
    let entry = cache.peek("abc").await.unwrap();
    assert_eq!(entry.id, "abc");
    assert_eq!(entry.metadata.title, "abc take 2");
}

#[tokio::test]
async fn zero_window_expires_immediately() {
    let cache = MetadataCache::new(
        ScriptedFetcher::default(),
        CacheConfig {
            expiry: Duration::ZERO,
            capacity: None,
        },
    );

    cache.get_metadata("abc", false, None).await.unwrap();
    let again = cache.get_metadata("abc", false, None).await.unwrap();

    assert!(again.fresh);
    assert_eq!(cache.fetcher().calls(), 2);
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let cache = cache(ScriptedFetcher::with_script([Outcome::Transient]));

    let entry = cache.get_metadata("abc", false, None).await.unwrap();

    assert!(entry.fresh);
    assert_eq!(entry.metadata.title, "abc take 2");
    assert_eq!(cache.fetcher().calls(), 2);
}

#[tokio::test]
async fn io_failure_is_not_retried() {
    let cache = cache(ScriptedFetcher::with_script([Outcome::Io]));

    let err = cache.get_metadata("abc", false, None).await.unwrap_err();

    assert!(matches!(err, FetchError::Io { .. }));
    assert_eq!(cache.fetcher().calls(), 1);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn double_failure_surfaces_retry_exhausted() {
    let cache = cache(ScriptedFetcher::with_script([
        Outcome::Transient,
        Outcome::Transient,
    ]));

    let err = cache.get_metadata("abc", false, None).await.unwrap_err();

    match &err {
        FetchError::RetryExhausted { id, source } => {
            assert_eq!(id, "abc");
            assert!(matches!(**source, FetchError::Source { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(cache.fetcher().calls(), 2);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_entry() {
    let cache = cache(ScriptedFetcher::with_script([
        Outcome::Ok,
        Outcome::Io,
    ]));

    cache.get_metadata("abc", false, None).await.unwrap();
    assert!(cache.get_metadata("abc", true, None).await.is_err());

    let entry = cache.get_metadata("abc", false, None).await.unwrap();
    assert_eq!(entry.metadata.title, "abc take 1");
    assert_eq!(cache.fetcher().calls(), 2);
}

#[tokio::test]
async fn progress_reaches_the_fetcher_on_every_attempt() {
    let cache = cache(ScriptedFetcher::with_script([Outcome::Transient]));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: Progress = Arc::new(move |msg: &str| sink.lock().unwrap().push(msg.to_string()));

    cache.get_metadata("abc", false, Some(progress)).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["fetching abc", "fetching abc"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_lookups_share_one_fetch() {
    let cache = Arc::new(cache(ScriptedFetcher {
        delay: Some(Duration::from_millis(50)),
        ..Default::default()
    }));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_metadata("abc", false, None).await })
        })
        .collect();

    let mut fresh = 0;
    for handle in handles {
        let entry = handle.await.unwrap().unwrap();
        assert_eq!(entry.metadata.title, "abc take 1");
        if entry.fresh {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1);
    assert_eq!(cache.fetcher().calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_forced_lookups_each_fetch() {
    let cache = Arc::new(cache(ScriptedFetcher {
        delay: Some(Duration::from_millis(10)),
        ..Default::default()
    }));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_metadata("abc", true, None).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().fresh);
    }

    assert_eq!(cache.fetcher().calls(), 4);
    assert_eq!(cache.len().await, 1);
}
