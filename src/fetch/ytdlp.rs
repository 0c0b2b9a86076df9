use super::{Fetcher, Progress, VideoMetadata};
use crate::config::YtDlpConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use url::Url;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Metadata as dumped by `yt-dlp --dump-single-json`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamFormat {
    pub format_id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

impl StreamFormat {
    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none")
            && self.acodec.as_deref().is_some_and(|c| c != "none")
    }
}

impl VideoInfo {
    /// Audio-only stream with the highest bitrate.
    pub fn best_audio(&self) -> Option<&StreamFormat> {
        self.formats
            .iter()
            .filter(|f| f.is_audio_only())
            .max_by(|a, b| {
                a.abr
                    .unwrap_or(0.0)
                    .partial_cmp(&b.abr.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
    }
}

impl VideoMetadata for VideoInfo {
    fn video_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.formats
            .iter()
            .filter_map(|f| f.url.as_deref())
            .filter_map(url_expiry)
            .min()
    }
}

// Signed googlevideo URLs carry their deadline as `expire=<unix secs>`.
fn url_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let url = Url::parse(raw).ok()?;
    let (_, secs) = url.query_pairs().find(|(k, _)| k == "expire")?;
    DateTime::from_timestamp(secs.parse::<i64>().ok()?, 0)
}

/// Fetches metadata by running the `yt-dlp` executable.
pub struct YtDlpFetcher {
    bin: PathBuf,
    extra_args: Vec<String>,
}

impl YtDlpFetcher {
    pub fn new(config: YtDlpConfig) -> Self {
        Self {
            bin: config.bin,
            extra_args: config.extra_args,
        }
    }

    fn command(&self, id: &str) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&self.extra_args)
            .arg("--dump-single-json")
            .arg("--no-playlist")
            .arg(format!("{WATCH_URL}{id}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    type Metadata = VideoInfo;

    async fn fetch(&self, id: &str, on_progress: &Progress) -> Result<VideoInfo, FetchError> {
        let io_err = |source: io::Error| FetchError::Io {
            id: id.to_string(),
            source,
        };

        let mut child = self.command(id).spawn().map_err(io_err)?;
        let (mut stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                return Err(io_err(io::Error::new(
                    io::ErrorKind::Other,
                    "yt-dlp pipes were not captured",
                )))
            }
        };

        let mut output = Vec::new();
        let (read, last_error) = tokio::join!(
            stdout.read_to_end(&mut output),
            forward_stderr(stderr, on_progress)
        );
        read.map_err(io_err)?;
        let status = child.wait().await.map_err(io_err)?;

        if !status.success() {
            return Err(FetchError::Source {
                id: id.to_string(),
                message: last_error.unwrap_or_else(|| format!("yt-dlp exited with {status}")),
            });
        }

        serde_json::from_slice(&output).map_err(|source| FetchError::Malformed {
            id: id.to_string(),
            source,
        })
    }
}

/// Passes every stderr line to the progress callback and returns the line
/// that best explains a failure.
async fn forward_stderr(stderr: ChildStderr, on_progress: &Progress) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last_line = None;
    let mut last_error = None;

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        on_progress(line);
        if line.starts_with("ERROR:") {
            last_error = Some(line.to_string());
        }
        last_line = Some(line.to_string());
    }

    last_error.or(last_line)
}
