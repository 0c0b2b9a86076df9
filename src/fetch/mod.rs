mod ytdlp;

pub use ytdlp::*;

use crate::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Progress callback handed through to the fetcher untouched.
pub type Progress = Arc<dyn Fn(&str) + Send + Sync>;

pub fn no_progress() -> Progress {
    Arc::new(|_: &str| {})
}

/// What the cache needs to know about fetched metadata.
pub trait VideoMetadata: Send + Sync + 'static {
    fn video_id(&self) -> &str;

    fn title(&self) -> &str;

    /// Point after which the source itself stops honouring this metadata
    /// (signed stream URLs and the like).
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    type Metadata: VideoMetadata;

    async fn fetch(&self, id: &str, on_progress: &Progress) -> Result<Self::Metadata, FetchError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    type Metadata = F::Metadata;

    async fn fetch(&self, id: &str, on_progress: &Progress) -> Result<Self::Metadata, FetchError> {
        (**self).fetch(id, on_progress).await
    }
}
