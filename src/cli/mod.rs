//! Command-line surface: flag parsing, spec-file loading and validation into
//! a [`BenchmarkConfig`].

pub mod report;

use crate::domain::{BenchmarkConfig, BenchmarkSpecPayload, ConfigError, DEFAULT_MAX_CONCURRENCY};
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

const ABOUT: &str = "\
bencher benchmarks a url and returns the number of requests sent, together with total bytes \
sent/received.
The bytes sent/received is inclusive of request line, request headers, response line, response \
headers & response body.
It only currently works with http GET method.";

#[derive(Parser, Debug)]
#[command(name = "bencher", version, about = ABOUT)]
#[command(after_help = "Example:\n  bencher -u https://example.com -c 10")]
pub struct CliArgs {
    /// URL to send requests to.
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Total number of requests to send.
    #[arg(short = 'c', long = "count")]
    pub count: Option<u64>,

    /// Maximum number of requests in flight at once [default: 10].
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extra request header as `Name: Value`; may be repeated.
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// JSON spec file (`url`, `requestCount`, `maxConcurrency`, `headers`).
    /// Flags given on the command line override its fields.
    #[arg(long, value_name = "FILE")]
    pub spec: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything `main` needs to run and report one benchmark.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub benchmark: BenchmarkConfig,
    pub output_format: OutputFormat,
}

impl CliConfig {
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let spec = resolve_spec(&args)?;
        Ok(Self {
            benchmark: BenchmarkConfig::try_from(spec)?,
            output_format: args.format,
        })
    }
}

fn resolve_spec(args: &CliArgs) -> Result<BenchmarkSpecPayload, ConfigError> {
    let mut spec = match &args.spec {
        Some(path) => BenchmarkSpecPayload::load(path)?,
        None => BenchmarkSpecPayload {
            url: args
                .url
                .clone()
                .ok_or(ConfigError::MissingSetting("url"))?,
            request_count: args.count.ok_or(ConfigError::MissingSetting("count"))?,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            headers: BTreeMap::new(),
        },
    };

    if let Some(url) = &args.url {
        spec.url = url.clone();
    }
    if let Some(count) = args.count {
        spec.request_count = count;
    }
    if let Some(concurrency) = args.concurrency {
        spec.max_concurrency = concurrency;
    }
    for line in &args.headers {
        let (name, value) = parse_header_line(line)?;
        spec.headers.insert(name, value);
    }

    Ok(spec)
}

fn parse_header_line(raw: &str) -> Result<(String, String), ConfigError> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidHeader {
            name: raw.to_string(),
            reason: "expected `Name: Value`".to_string(),
        })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidHeader {
            name: raw.to_string(),
            reason: "header name is empty".to_string(),
        });
    }
    Ok((key.to_string(), value.trim().to_string()))
}
