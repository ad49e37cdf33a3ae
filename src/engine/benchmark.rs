use crate::domain::{
    AggregateError, BenchmarkConfig, BenchmarkError, BenchmarkResult, FetchError, FetchOutcome,
    LatencySummary,
};
use crate::engine::http::{build_client, fetch, request_headers};
use hdrhistogram::Histogram;
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const HISTOGRAM_MAX_US: u64 = 60_000_000;

/// Runs a fixed number of GET requests against one URL with bounded
/// concurrency and folds every outcome into a [`BenchmarkResult`].
///
/// Each call to [`Benchmark::run`] owns its own aggregate, so several
/// benchmarks can run in the same process.
#[derive(Debug, Clone)]
pub struct Benchmark {
    config: BenchmarkConfig,
}

#[derive(Debug)]
struct RequestTemplate {
    url: Url,
    headers: HeaderMap,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Only client construction and crashed workers are fatal. Failed
    /// requests are counted and collected in [`BenchmarkResult::errors`].
    pub async fn run(&self) -> Result<BenchmarkResult, BenchmarkError> {
        let client = build_client().map_err(BenchmarkError::Client)?;
        let template = Arc::new(RequestTemplate {
            url: self.config.target_url().clone(),
            headers: request_headers(self.config.headers()),
        });

        info!(
            event = "benchmark_start",
            url = %template.url,
            requests = self.config.request_count(),
            concurrency = self.config.max_concurrency()
        );

        let result = run_phase(
            client,
            template,
            self.config.request_count(),
            self.config.max_concurrency(),
        )
        .await?;

        info!(
            event = "benchmark_end",
            requests = result.total_requests,
            successes = result.total_successes,
            failures = result.total_failures,
            throughput_bytes = result.total_throughput_bytes,
            elapsed_ms = result.elapsed_ms
        );
        if result.total_failures > 0 {
            warn!(
                failures = result.total_failures,
                errors = result.errors.len(),
                "some requests failed; see report for details"
            );
        }

        Ok(result)
    }
}

async fn run_phase(
    client: Client,
    template: Arc<RequestTemplate>,
    request_count: u64,
    concurrency: usize,
) -> Result<BenchmarkResult, BenchmarkError> {
    let started = Instant::now();
    let aggregator = Arc::new(Aggregator::new()?);
    let next_index = Arc::new(AtomicU64::new(0));
    let worker_count = (concurrency.max(1) as u64).min(request_count) as usize;

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let client = client.clone();
        let template = template.clone();
        let aggregator = aggregator.clone();
        let next_index = next_index.clone();

        let handle = tokio::spawn(async move {
            loop {
                let index = next_index.fetch_add(1, Ordering::Relaxed);
                if index >= request_count {
                    break;
                }

                let outcome = fetch(&client, &template.url, &template.headers).await;
                aggregator.record(index, outcome);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await?;
    }

    Ok(aggregator.finish(started.elapsed()))
}

/// Welford running mean/variance plus min/max, in milliseconds.
#[derive(Default)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count as f64 - 1.0)).sqrt()
    }
}

struct LatencyRecorder {
    stats: RunningStats,
    histogram: Histogram<u64>,
}

impl LatencyRecorder {
    fn new() -> Result<Self, BenchmarkError> {
        Ok(Self {
            stats: RunningStats::default(),
            histogram: Histogram::new_with_bounds(1, HISTOGRAM_MAX_US, 3)?,
        })
    }

    fn record(&mut self, latency: Duration) {
        self.stats.add(latency.as_secs_f64() * 1000.0);
        let latency_us = (latency.as_micros() as u64).clamp(1, HISTOGRAM_MAX_US);
        let _ = self.histogram.record(latency_us);
    }

    fn summary(&self) -> LatencySummary {
        if self.stats.count == 0 {
            return LatencySummary::default();
        }

        let quantile_ms =
            |q: f64| round_to_3(self.histogram.value_at_quantile(q) as f64 / 1000.0);
        LatencySummary {
            min_ms: round_to_3(self.stats.min),
            avg_ms: round_to_3(self.stats.mean),
            max_ms: round_to_3(self.stats.max),
            stddev_ms: round_to_3(self.stats.stddev()),
            p50_ms: quantile_ms(0.50),
            p90_ms: quantile_ms(0.90),
            p95_ms: quantile_ms(0.95),
            p99_ms: quantile_ms(0.99),
        }
    }
}

fn round_to_3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Shared, synchronized totals for one run. Every completed request goes
/// through [`Aggregator::record`] exactly once.
struct Aggregator {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    request_header_bytes: AtomicU64,
    response_header_bytes: AtomicU64,
    response_body_bytes: AtomicU64,
    throughput_bytes: AtomicU64,
    body_read_errors: AtomicU64,
    errors: Mutex<AggregateError>,
    latency: Mutex<LatencyRecorder>,
}

impl Aggregator {
    fn new() -> Result<Self, BenchmarkError> {
        Ok(Self {
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            request_header_bytes: AtomicU64::new(0),
            response_header_bytes: AtomicU64::new(0),
            response_body_bytes: AtomicU64::new(0),
            throughput_bytes: AtomicU64::new(0),
            body_read_errors: AtomicU64::new(0),
            errors: Mutex::new(AggregateError::new()),
            latency: Mutex::new(LatencyRecorder::new()?),
        })
    }

    fn record(&self, index: u64, outcome: FetchOutcome) {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let measurement = match outcome {
            Ok(measurement) => measurement,
            Err(err) => {
                debug!(index, kind = err.kind(), error = %err, "request failed");
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.push_error(err);
                return;
            }
        };

        debug!(
            index,
            status = measurement.status_code,
            throughput_bytes = measurement.throughput_bytes,
            latency_ms = measurement.latency.as_secs_f64() * 1000.0,
            "request completed"
        );

        self.request_header_bytes
            .fetch_add(measurement.request_header_bytes, Ordering::Relaxed);
        self.response_header_bytes
            .fetch_add(measurement.response_header_bytes, Ordering::Relaxed);
        self.response_body_bytes
            .fetch_add(measurement.response_body_bytes, Ordering::Relaxed);
        self.throughput_bytes
            .fetch_add(measurement.throughput_bytes, Ordering::Relaxed);
        self.latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(measurement.latency);

        if let Some(err) = measurement.body_error {
            debug!(index, kind = err.kind(), error = %err, "response body incomplete");
            self.body_read_errors.fetch_add(1, Ordering::Relaxed);
        }

        if measurement.status_code == 200 {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            debug!(index, status = measurement.status_code, "unexpected status");
            self.failures.fetch_add(1, Ordering::Relaxed);
            self.push_error(FetchError::NonSuccessStatus(measurement.status_code));
        }
    }

    fn push_error(&self, err: FetchError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err);
    }

    fn finish(&self, elapsed: Duration) -> BenchmarkResult {
        let total_requests = self.requests.load(Ordering::Relaxed);
        let errors = std::mem::take(
            &mut *self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let latency = self
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary();

        let requests_per_second = if total_requests == 0 {
            0.0
        } else {
            round_to_3(total_requests as f64 / elapsed.as_secs_f64().max(0.001))
        };

        BenchmarkResult {
            total_requests,
            total_successes: self.successes.load(Ordering::Relaxed),
            total_failures: self.failures.load(Ordering::Relaxed),
            total_request_header_bytes: self.request_header_bytes.load(Ordering::Relaxed),
            total_response_header_bytes: self.response_header_bytes.load(Ordering::Relaxed),
            total_response_body_bytes: self.response_body_bytes.load(Ordering::Relaxed),
            total_throughput_bytes: self.throughput_bytes.load(Ordering::Relaxed),
            total_body_read_errors: self.body_read_errors.load(Ordering::Relaxed),
            errors,
            latency,
            elapsed_ms: elapsed.as_millis() as u64,
            requests_per_second,
        }
    }
}
