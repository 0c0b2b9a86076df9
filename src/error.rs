use std::io;
use thiserror::Error;

/// Failure of a metadata fetch, tagged by where it came from.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The metadata source itself failed (extractor error, bad exit status).
    #[error("metadata source failed for {id}: {message}")]
    Source { id: String, message: String },

    /// The metadata source answered with something that could not be parsed.
    #[error("metadata source returned malformed output for {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Any other I/O failure, e.g. the source could not be started at all.
    #[error("i/o error while fetching {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("fetch for {id} failed again after retry: {source}")]
    RetryExhausted {
        id: String,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Errors raised inside the fetch subsystem are worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Source { .. } | FetchError::Malformed { .. })
    }

    pub fn id(&self) -> &str {
        match self {
            FetchError::Source { id, .. }
            | FetchError::Malformed { id, .. }
            | FetchError::Io { id, .. }
            | FetchError::RetryExhausted { id, .. } => id,
        }
    }
}
