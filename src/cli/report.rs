use crate::cli::OutputFormat;
use crate::domain::BenchmarkResult;
use std::fmt::Write;

pub fn render(result: &BenchmarkResult, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(render_text(result)),
        OutputFormat::Json => serde_json::to_string_pretty(result),
    }
}

/// Plain-text report. Totals are always printed, whatever the error count.
pub fn render_text(result: &BenchmarkResult) -> String {
    let mut out = String::new();
    let latency = &result.latency;

    // Writing to a String cannot fail.
    let _ = writeln!(out, "allErrors: {}", result.errors);
    let _ = writeln!(out, "totalBenchmarkRequests: {}", result.total_requests);
    let _ = writeln!(out, "totalBenchmarkRequestSuccess: {}", result.total_successes);
    let _ = writeln!(out, "totalBenchmarkRequestFailure: {}", result.total_failures);
    let _ = writeln!(
        out,
        "totalBenchmarkRequestHeaderSize: {} bytes.",
        result.total_request_header_bytes
    );
    let _ = writeln!(
        out,
        "totalBenchmarkResponseHeaderSize: {} bytes.",
        result.total_response_header_bytes
    );
    let _ = writeln!(
        out,
        "totalBenchmarkResponseBodySize: {} bytes.",
        result.total_response_body_bytes
    );
    let _ = writeln!(
        out,
        "totalBenchmarkThroughput: {} bytes. <- includes request/response line,headers,body.",
        result.total_throughput_bytes
    );
    if result.total_body_read_errors > 0 {
        let _ = writeln!(
            out,
            "incompleteResponseBodies: {}",
            result.total_body_read_errors
        );
    }
    let _ = writeln!(
        out,
        "elapsed: {} ms ({} requests/sec)",
        result.elapsed_ms, result.requests_per_second
    );
    let _ = write!(
        out,
        "latency: min {} ms, avg {} ms, max {} ms, stddev {} ms, p50 {} ms, p90 {} ms, p95 {} ms, p99 {} ms",
        latency.min_ms,
        latency.avg_ms,
        latency.max_ms,
        latency.stddev_ms,
        latency.p50_ms,
        latency.p90_ms,
        latency.p95_ms,
        latency.p99_ms
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AggregateError, FetchError};

    #[test]
    fn text_report_without_errors_says_so() {
        let result = BenchmarkResult {
            total_requests: 3,
            total_successes: 3,
            total_response_body_bytes: 300,
            total_throughput_bytes: 450,
            ..BenchmarkResult::default()
        };

        let text = render_text(&result);

        assert!(text.starts_with("allErrors: no errors\n"));
        assert!(text.contains("totalBenchmarkRequests: 3\n"));
        assert!(text.contains("totalBenchmarkResponseBodySize: 300 bytes."));
        assert!(text.contains("totalBenchmarkThroughput: 450 bytes."));
        assert!(!text.contains("incompleteResponseBodies"));
    }

    #[test]
    fn text_report_prints_errors_verbatim() {
        let mut errors = AggregateError::new();
        errors.push(FetchError::NonSuccessStatus(500));
        errors.push(FetchError::NonSuccessStatus(502));
        let result = BenchmarkResult {
            total_requests: 2,
            total_failures: 2,
            errors,
            ..BenchmarkResult::default()
        };

        let text = render_text(&result);

        assert!(text.starts_with("allErrors: responseCode: 500\nresponseCode: 502\n"));
        assert!(text.contains("totalBenchmarkRequestFailure: 2\n"));
    }

    #[test]
    fn json_report_uses_camel_case_fields() {
        let result = BenchmarkResult {
            total_requests: 1,
            total_successes: 1,
            ..BenchmarkResult::default()
        };

        let json = render(&result, OutputFormat::Json).expect("json report");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["totalRequests"], 1);
        assert_eq!(value["totalSuccesses"], 1);
        assert_eq!(value["errors"], serde_json::json!([]));
        assert_eq!(value["latency"]["p99Ms"], 0.0);
    }
}
