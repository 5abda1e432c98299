use thiserror::Error;

/// Misconfiguration detected before any work starts. The only error class
/// that aborts a publish run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Malformed markup. Recovered inside the transcoder, never returned to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("markup nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Failure to materialize an image in the destination store.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is {size} bytes, limit is {limit}")]
    TooLarge { url: String, size: u64, limit: u64 },
    #[error("{url} is not an image (content type {content_type:?})")]
    UnsupportedFormat { url: String, content_type: String },
    #[error("failed to store image: {0}")]
    Store(String),
}

impl ImageError {
    /// Transport errors, rate limiting and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ImageError::Fetch { .. } => true,
            ImageError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The destination rejected (or never received) a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("destination rejected batch: code={code}, msg={msg}")]
    Rejected { code: i64, msg: String },
    #[error("transport error: {0}")]
    Transport(String),
}
