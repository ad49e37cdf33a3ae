use serde::{Serialize, Serializer};
use std::fmt::{self, Display};
use thiserror::Error;

/// Error produced by a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build request: {0}")]
    RequestConstruction(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    #[error("responseCode: {0}")]
    NonSuccessStatus(u16),
}

impl FetchError {
    /// Short, stable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::RequestConstruction(_) => "REQUEST_CONSTRUCTION",
            FetchError::Transport(err) if err.is_timeout() => "TIMEOUT",
            FetchError::Transport(err) if err.is_connect() => "CONNECT_ERROR",
            FetchError::Transport(_) => "TRANSPORT_ERROR",
            FetchError::BodyRead(_) => "READ_ERROR",
            FetchError::NonSuccessStatus(_) => "HTTP_STATUS",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("URL `{0}` has no scheme; use e.g. https://example.com")]
    MissingScheme(String),

    #[error("request count must be greater than 0")]
    ZeroRequestCount,

    #[error("max concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to read spec file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse spec file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal coordinator errors. Per-request failures never end up here.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("failed to build benchmark HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to initialize latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[error("benchmark worker crashed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Every per-request error observed during a run, combined into one value.
///
/// Insertion order follows completion order, which is not deterministic;
/// callers should treat the contents as a bag.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<FetchError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: FetchError) {
        self.errors.push(err);
    }

    /// Joins another aggregate into this one.
    pub fn join(&mut self, other: AggregateError) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FetchError> {
        self.errors.iter()
    }
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "no errors");
        }
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

impl Serialize for AggregateError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.errors.iter().map(ToString::to_string))
    }
}

impl<'a> IntoIterator for &'a AggregateError {
    type Item = &'a FetchError;
    type IntoIter = std::slice::Iter<'a, FetchError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
