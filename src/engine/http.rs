use crate::domain::{ConfigError, FetchError, FetchMeasurement, FetchOutcome};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode, Url};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Client-level timeout applied to every benchmark request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_USER_AGENT: &str = concat!("bencher/", env!("CARGO_PKG_VERSION"));

pub fn build_headers(input: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name =
            HeaderName::from_bytes(key.as_bytes()).map_err(|err| ConfigError::InvalidHeader {
                name: key.clone(),
                reason: err.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|err| ConfigError::InvalidHeader {
                name: key.clone(),
                reason: err.to_string(),
            })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Headers sent with every benchmark request: the configured ones plus a
/// default user agent when none was given.
pub fn request_headers(configured: &HeaderMap) -> HeaderMap {
    let mut headers = configured.clone();
    headers
        .entry(USER_AGENT)
        .or_insert_with(|| HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

pub fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(REQUEST_TIMEOUT)
        .build()
}

// A start line followed by one `Name: Value` line per distinct header name,
// using the first value. Each line ends with `\n`.
fn header_block(start_line: &str, headers: &HeaderMap) -> Vec<u8> {
    let mut block = Vec::with_capacity(start_line.len() + 1 + headers.keys_len() * 32);
    block.extend_from_slice(start_line.as_bytes());
    block.push(b'\n');

    for name in headers.keys() {
        if let Some(value) = headers.get(name) {
            block.extend_from_slice(name.as_str().as_bytes());
            block.extend_from_slice(b": ");
            block.extend_from_slice(value.as_bytes());
            block.push(b'\n');
        }
    }

    block
}

/// Size of the request as `METHOD PATH HTTP/2` plus its headers.
pub fn request_header_size(method: &Method, url: &Url, headers: &HeaderMap) -> u64 {
    let start_line = format!("{method} {} HTTP/2", url.path());
    header_block(&start_line, headers).len() as u64
}

/// Size of the response as `HTTP/2 STATUS` plus its headers.
pub fn response_header_size(status: StatusCode, headers: &HeaderMap) -> u64 {
    let start_line = format!("HTTP/2 {}", status.as_u16());
    header_block(&start_line, headers).len() as u64
}

/// Sends one GET request and measures it.
///
/// Byte counts only describe synthesized header blocks and the body length;
/// they approximate the bytes moved, not the on-wire framing.
pub async fn fetch(client: &Client, url: &Url, headers: &HeaderMap) -> FetchOutcome {
    let request = client
        .get(url.clone())
        .headers(headers.clone())
        .build()
        .map_err(FetchError::RequestConstruction)?;
    let request_header_bytes =
        request_header_size(request.method(), request.url(), request.headers());

    let started = Instant::now();
    let response = client
        .execute(request)
        .await
        .map_err(FetchError::Transport)?;

    let status = response.status();
    let response_header_bytes = response_header_size(status, response.headers());
    let declared_body_bytes = response.content_length().unwrap_or(0);

    let (read_body_bytes, body_error) = drain_body(response).await;
    let latency = started.elapsed();

    let response_body_bytes = declared_body_bytes.max(read_body_bytes);

    Ok(FetchMeasurement {
        request_header_bytes,
        response_header_bytes,
        response_body_bytes,
        throughput_bytes: request_header_bytes + response_header_bytes + response_body_bytes,
        status_code: status.as_u16(),
        latency,
        body_error,
    })
}

// Consumes the response; the connection is released when it drops here,
// whether or not the body was read to the end.
async fn drain_body(mut response: Response) -> (u64, Option<FetchError>) {
    let mut read = 0u64;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len() as u64,
            Ok(None) => return (read, None),
            Err(err) => return (read, Some(FetchError::BodyRead(err))),
        }
    }
}
