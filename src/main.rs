use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use futures::future::join_all;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use video_meta_cache::cache::{CacheEntry, MetadataCache};
use video_meta_cache::config::AppConfig;
use video_meta_cache::fetch::{Progress, VideoInfo, YtDlpFetcher};
use video_meta_cache::util::{find_executable, set_window_title};

#[derive(Parser, Debug)]
#[command(
    name = "video_meta_cache",
    version = env!("CARGO_PKG_VERSION"),
    about = "Look up video metadata through yt-dlp, memoized in-process",
    long_about = None
)]
struct Cli {
    /// TOML config file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bypass the cache and fetch every id again.
    #[arg(long)]
    force: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Extra lookup rounds after the first one.
    #[arg(long, default_value_t = 0)]
    repeat: usize,

    #[arg(required = true)]
    ids: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    // Bare names are resolved the way a shell would.
    if config.ytdlp.bin.components().count() == 1 {
        match config.ytdlp.bin.to_str().and_then(find_executable) {
            Some(found) => config.ytdlp.bin = found,
            None => warn!(bin = %config.ytdlp.bin.display(), "executable not found on PATH"),
        }
    }

    if let Err(e) = set_window_title(&mut io::stdout(), "video_meta_cache") {
        debug!(error = %e, "could not set window title");
    }

    let cache = MetadataCache::new(YtDlpFetcher::new(config.ytdlp), config.cache);
    let force = cli.force;
    let mut failures = 0usize;

    for round in 0..=cli.repeat {
        info!(round, ids = cli.ids.len(), "looking up metadata");

        let cache = &cache;
        let lookups = cli.ids.iter().map(|id| {
            let progress: Progress = {
                let id = id.clone();
                Arc::new(move |line: &str| debug!(id = %id, "{line}"))
            };
            async move { (id, cache.get_metadata(id, force, Some(progress)).await) }
        });

        for (id, result) in join_all(lookups).await {
            match result {
                Ok(entry) => println!("{}", describe(&entry)),
                Err(err) => {
                    failures += 1;
                    error!(id = %id, error = %err, "metadata lookup failed");
                }
            }
        }
    }

    if failures > 0 {
        bail!("{failures} lookup(s) failed");
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "video_meta_cache=debug"
    } else {
        "video_meta_cache=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn describe(entry: &CacheEntry<VideoInfo>) -> String {
    let info = &entry.metadata;
    let duration = info
        .duration
        .map(format_duration)
        .unwrap_or_else(|| "--:--".to_string());
    let state = if entry.fresh { "fresh" } else { "cached" };

    let mut line = format!("{}  {}  {}  [{}]", entry.id, duration, info.title, state);
    if let Some(audio) = info.best_audio() {
        line.push_str(&format!(
            "  audio {} {} {:.0}k",
            audio.format_id,
            audio.ext.as_deref().unwrap_or("?"),
            audio.abr.unwrap_or(0.0)
        ));
    }
    line
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, total / 60 % 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
