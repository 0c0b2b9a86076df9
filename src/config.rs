use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::cache::DEFAULT_EXPIRY;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a fetched entry is trusted.
    pub expiry: Duration,
    /// Upper bound on stored entries; `None` keeps every entry until it is overwritten.
    pub capacity: Option<NonZeroUsize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry: DEFAULT_EXPIRY,
            capacity: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub bin: PathBuf,
    pub extra_args: Vec<String>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            bin: PathBuf::from("yt-dlp"),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub ytdlp: YtDlpConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppConfigFile {
    expiry_secs: Option<u64>,
    capacity: Option<usize>,
    ytdlp_bin: Option<String>,
    ytdlp_args: Option<Vec<String>>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: AppConfigFile = toml::from_str(raw).context("Failed to parse config TOML")?;

        let expiry = match file.expiry_secs {
            Some(0) => return Err(anyhow!("expiry_secs must be greater than zero")),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_EXPIRY,
        };

        let capacity = match file.capacity {
            Some(n) => Some(
                NonZeroUsize::new(n).ok_or_else(|| anyhow!("capacity must be greater than zero"))?,
            ),
            None => None,
        };

        let bin = file
            .ytdlp_bin
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "yt-dlp".to_string());

        let extra_args = file
            .ytdlp_args
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            cache: CacheConfig { expiry, capacity },
            ytdlp: YtDlpConfig {
                bin: PathBuf::from(bin),
                extra_args,
            },
        })
    }
}
