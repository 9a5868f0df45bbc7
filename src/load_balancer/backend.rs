//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server by its configured base URL
//! - Carry the static liveness flag read by the selectors
//! - Forward one request to the upstream and stream the response back

use axum::body::Body;
use axum::http::{Request, Response, Version};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use crate::error::BalancerError;
use crate::http::forward::{self, HttpClient};
use crate::http::X_REQUEST_ID;

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// The address exactly as configured. Ring placement hashes this string.
    address: String,
    /// Parsed base URL requests are rewritten onto.
    url: Url,
    /// Liveness flag. Backends start alive.
    alive: AtomicBool,
}

impl Backend {
    /// Create a backend from an already parsed URL.
    pub fn new(address: impl Into<String>, url: Url) -> Self {
        Self {
            address: address.into(),
            url,
            alive: AtomicBool::new(true),
        }
    }

    /// Parse a backend from its configured base URL.
    pub fn parse(address: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(address)?;
        Ok(Self::new(address, url))
    }

    /// The configured address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The parsed base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Toggle liveness. Selection skips dead backends from the next pick on.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }

    /// Forward `request` to this backend and return the upstream response.
    ///
    /// Method, headers and body are preserved; only the URI is rewritten onto
    /// the backend base URL and hop-by-hop headers are dropped. The response
    /// body is streamed, not buffered. There is no retry: any transport error
    /// or a timeout waiting for the response head becomes
    /// [`BalancerError::UpstreamUnavailable`].
    pub async fn forward(
        &self,
        client: &HttpClient,
        request: Request<Body>,
        peer: SocketAddr,
        timeout: Duration,
    ) -> Result<Response<Body>, BalancerError> {
        let (mut parts, body) = request.into_parts();

        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        tracing::info!(
            backend = %self.address,
            request_id = %request_id,
            method = %parts.method,
            path = %parts.uri.path(),
            "Forwarding request"
        );

        parts.uri = forward::rewrite_uri(&self.url, &parts.uri)
            .map_err(|e| self.unavailable(e.to_string()))?;
        forward::strip_hop_by_hop(&mut parts.headers);
        forward::append_forwarded_for(&mut parts.headers, peer.ip());
        // The pooled client speaks HTTP/1.1 to backends regardless of the inbound version.
        parts.version = Version::HTTP_11;

        let upstream = Request::from_parts(parts, body);
        let response = match tokio::time::timeout(timeout, client.request(upstream)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(backend = %self.address, request_id = %request_id, error = %e, "Upstream error");
                return Err(self.unavailable(e.to_string()));
            }
            Err(_) => {
                tracing::error!(backend = %self.address, request_id = %request_id, timeout = ?timeout, "Upstream timed out");
                return Err(self.unavailable(format!("no response within {:?}", timeout)));
            }
        };

        let (mut parts, body) = response.into_parts();
        forward::strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    fn unavailable(&self, reason: String) -> BalancerError {
        BalancerError::UpstreamUnavailable {
            address: self.address.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_configured_address() {
        let b = Backend::parse("http://127.0.0.1:3000").unwrap();
        assert_eq!(b.address(), "http://127.0.0.1:3000");
        assert_eq!(b.url().port(), Some(3000));
        assert!(b.is_alive());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Backend::parse("not a url").is_err());
    }

    #[test]
    fn alive_flag_toggles() {
        let b = Backend::parse("http://127.0.0.1:3000").unwrap();
        b.set_alive(false);
        assert!(!b.is_alive());
        b.set_alive(true);
        assert!(b.is_alive());
    }
}
