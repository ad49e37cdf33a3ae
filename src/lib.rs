//! HTTP GET load tester.
//!
//! Sends a fixed number of GET requests to one URL with bounded concurrency
//! and reports request/response header and body byte totals along with
//! success, failure and error counts.

pub mod cli;
pub mod domain;
pub mod engine;

pub use domain::{
    AggregateError, BenchmarkConfig, BenchmarkError, BenchmarkResult, BenchmarkSpecPayload,
    ConfigError, FetchError,
};
pub use engine::benchmark::Benchmark;
