pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod util;

pub use cache::{CacheEntry, MetadataCache};
pub use config::{AppConfig, CacheConfig, YtDlpConfig};
pub use error::FetchError;
pub use fetch::{Fetcher, Progress, VideoMetadata};
