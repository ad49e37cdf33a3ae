use crate::domain::errors::{AggregateError, ConfigError, FetchError};
use crate::engine::http::build_headers;
use reqwest::Url;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Raw benchmark description as read from a spec file or the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSpecPayload {
    pub url: String,
    pub request_count: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl BenchmarkSpecPayload {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// Validated, immutable benchmark configuration.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    target_url: Url,
    request_count: u64,
    max_concurrency: usize,
    headers: HeaderMap,
}

impl BenchmarkConfig {
    pub fn new(url: &str, request_count: u64) -> Result<Self, ConfigError> {
        Self::try_from(BenchmarkSpecPayload {
            url: url.to_string(),
            request_count,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            headers: BTreeMap::new(),
        })
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Result<Self, ConfigError> {
        if max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.max_concurrency = max_concurrency;
        Ok(self)
    }

    pub fn target_url(&self) -> &Url {
        &self.target_url
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl TryFrom<BenchmarkSpecPayload> for BenchmarkConfig {
    type Error = ConfigError;

    fn try_from(spec: BenchmarkSpecPayload) -> Result<Self, Self::Error> {
        let target_url = parse_target_url(spec.url.trim())?;
        if spec.request_count == 0 {
            return Err(ConfigError::ZeroRequestCount);
        }
        if spec.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let headers = build_headers(&spec.headers)?;

        Ok(Self {
            target_url,
            request_count: spec.request_count,
            max_concurrency: spec.max_concurrency,
            headers,
        })
    }
}

fn parse_target_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|err| match err {
        url::ParseError::RelativeUrlWithoutBase => ConfigError::MissingScheme(raw.to_string()),
        other => ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: other.to_string(),
        },
    })
}

/// Byte measurements for one request that produced a response.
#[derive(Debug)]
pub struct FetchMeasurement {
    pub request_header_bytes: u64,
    pub response_header_bytes: u64,
    pub response_body_bytes: u64,
    pub throughput_bytes: u64,
    pub status_code: u16,
    pub latency: Duration,
    /// Set when the body could not be read to the end. The byte counts above
    /// then use the best-known body length.
    pub body_error: Option<FetchError>,
}

pub type FetchOutcome = Result<FetchMeasurement, FetchError>;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub stddev_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Totals for a finished run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_request_header_bytes: u64,
    pub total_response_header_bytes: u64,
    pub total_response_body_bytes: u64,
    pub total_throughput_bytes: u64,
    pub total_body_read_errors: u64,
    pub errors: AggregateError,
    pub latency: LatencySummary,
    pub elapsed_ms: u64,
    pub requests_per_second: f64,
}
