//! Minimal HTTP/1.1 server for exercising the engine against real sockets.
//!
//! Every connection serves exactly one response and is then closed, so one
//! accepted connection corresponds to one benchmark request.

use reqwest::Url;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub enum BodyLength {
    /// `content-length` matches the body.
    Exact,
    /// No `content-length`; the body ends when the connection closes.
    Omitted,
    /// `content-length` announces this many bytes regardless of the body.
    Declared(usize),
}

#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub body: Vec<u8>,
    pub body_length: BodyLength,
    pub delay: Duration,
    /// Answer every Nth connection (1-based) with a 500.
    pub fail_every: Option<usize>,
}

impl MockBehavior {
    pub fn ok_with_body(len: usize) -> Self {
        Self {
            body: vec![b'x'; len],
            body_length: BodyLength::Exact,
            delay: Duration::ZERO,
            fail_every: None,
        }
    }

    fn render(&self, status: u16) -> Vec<u8> {
        let reason = if status == 200 { "OK" } else { "Internal Server Error" };
        let mut head = format!("HTTP/1.1 {status} {reason}\r\ncontent-type: text/plain\r\n");
        match self.body_length {
            BodyLength::Exact => head.push_str(&format!("content-length: {}\r\n", self.body.len())),
            BodyLength::Declared(len) => head.push_str(&format!("content-length: {len}\r\n")),
            BodyLength::Omitted => {}
        }
        head.push_str("connection: close\r\n\r\n");

        let mut response = head.into_bytes();
        response.extend_from_slice(&self.body);
        response
    }
}

#[derive(Default)]
struct ConnectionGauge {
    accepted: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

pub struct MockServer {
    addr: SocketAddr,
    gauge: Arc<ConnectionGauge>,
    accept_loop: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let gauge = Arc::new(ConnectionGauge::default());
        let behavior = Arc::new(behavior);

        let accept_gauge = gauge.clone();
        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let ordinal = accept_gauge.accepted.fetch_add(1, Ordering::SeqCst) + 1;
                let active = accept_gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
                accept_gauge.peak.fetch_max(active, Ordering::SeqCst);
                tokio::spawn(serve(
                    stream,
                    ordinal,
                    behavior.clone(),
                    accept_gauge.clone(),
                ));
            }
        });

        Self {
            addr,
            gauge,
            accept_loop,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).expect("mock server url")
    }

    /// A URL whose port was just released, so connecting is refused.
    pub fn unreachable_url() -> Url {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
        let port = listener.local_addr().expect("reserved address").port();
        drop(listener);
        Url::parse(&format!("http://127.0.0.1:{port}/")).expect("unreachable url")
    }

    pub fn connections_accepted(&self) -> usize {
        self.gauge.accepted.load(Ordering::SeqCst)
    }

    pub fn peak_connections(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }

    /// Size of the synthesized header block for a response from this server.
    pub fn response_header_bytes(status: u16, content_length: Option<usize>) -> u64 {
        let mut size = format!("HTTP/2 {status}\n").len()
            + "content-type: text/plain\n".len()
            + "connection: close\n".len();
        if let Some(len) = content_length {
            size += format!("content-length: {len}\n").len();
        }
        size as u64
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    ordinal: usize,
    behavior: Arc<MockBehavior>,
    gauge: Arc<ConnectionGauge>,
) {
    let mut request = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|window| window == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    if !behavior.delay.is_zero() {
        tokio::time::sleep(behavior.delay).await;
    }

    let status = match behavior.fail_every {
        Some(every) if every > 0 && ordinal % every == 0 => 500,
        _ => 200,
    };

    // The client is still waiting on this response, so the connection stops
    // counting as active before the client can finish its request.
    gauge.active.fetch_sub(1, Ordering::SeqCst);

    let _ = stream.write_all(&behavior.render(status)).await;
    let _ = stream.shutdown().await;
}
