use thiserror::Error;

/// A single upstream page could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("page decoding error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid upstream base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("cache is being refreshed, retry shortly")]
    CacheNotReady,
    #[error("no data in cache")]
    NoData,
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },
}

impl SearchError {
    /// Whether the caller can expect the same request to succeed after the next refresh.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::CacheNotReady | SearchError::NoData)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parsing error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
