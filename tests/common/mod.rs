//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ring_balancer::config::{BalancerConfig, KeySource, Strategy, TimeoutConfig};
use ring_balancer::{BalancerServer, Dispatcher, Shutdown};

/// What a mock backend saw for one request.
struct Seen {
    method: String,
    target: String,
    request_id: String,
    forwarded_for: String,
    body: String,
}

/// Start a mock backend on an ephemeral port.
///
/// Every response carries `X-Backend: <name>` and echoes the request line,
/// request ID and `X-Forwarded-For` back as `X-Seen-*` headers; the body is
/// the request body.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(serve_one(socket, name));
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn serve_one(mut socket: TcpStream, name: &'static str) {
    let Some(seen) = read_request(&mut socket).await else {
        return;
    };

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Backend: {}\r\nX-Seen-Method: {}\r\nX-Seen-Target: {}\r\nX-Seen-Request-Id: {}\r\nX-Seen-Forwarded-For: {}\r\nConnection: close\r\n\r\n{}",
        seen.body.len(),
        name,
        seen.method,
        seen.target,
        seen.request_id,
        seen.forwarded_for,
        seen.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn read_request(socket: &mut TcpStream) -> Option<Seen> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let mut request_id = String::new();
    let mut forwarded_for = String::new();
    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match name.trim().to_ascii_lowercase().as_str() {
            "x-request-id" => request_id = value,
            "x-forwarded-for" => forwarded_for = value,
            "content-length" => content_length = value.parse().unwrap_or(0),
            _ => {}
        }
    }

    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Seen {
        method,
        target,
        request_id,
        forwarded_for,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// Start a backend that accepts connections and reads requests but never
/// answers them.
pub async fn start_stalling_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Balancer config over `backends` with the given strategy and key source.
pub fn config(backends: &[SocketAddr], strategy: Strategy, hash_key: KeySource) -> BalancerConfig {
    let mut config = BalancerConfig {
        backends: backends.iter().map(|a| format!("http://{}", a)).collect(),
        ..Default::default()
    };
    config.listener.bind_address = "127.0.0.1:0".into();
    config.strategy.kind = strategy;
    config.strategy.hash_key = hash_key;
    config.timeouts.upstream_secs = 5;
    config
}

/// Start the balancer on an ephemeral port. Keep the returned [`Shutdown`]
/// alive for the duration of the test.
pub async fn start_balancer(config: BalancerConfig) -> (SocketAddr, Shutdown) {
    let timeouts = config.timeouts.clone();
    start_balancer_with_timeouts(config, timeouts).await
}

/// Like [`start_balancer`], but the front end enforces `timeouts` instead of
/// the (validated) timeouts in `config`.
pub async fn start_balancer_with_timeouts(
    config: BalancerConfig,
    timeouts: TimeoutConfig,
) -> (SocketAddr, Shutdown) {
    let dispatcher = Dispatcher::from_config(&config).unwrap();
    let server = BalancerServer::new(dispatcher, &timeouts);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
