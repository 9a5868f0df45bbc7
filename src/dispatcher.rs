//! Request dispatch: pick a backend, forward to it.
//!
//! # Responsibilities
//! - Own the fixed backend list and the configured selector
//! - Derive the per-request key for key-based selection
//! - Map selection and upstream failures to 5xx responses
//!
//! # Design Decisions
//! - The selector lock covers selection only; forwarding runs without it
//! - No retries and no failover to another backend

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{validate_config, BalancerConfig, ConfigError, KeySource, Strategy, ValidationError};
use crate::error::BalancerError;
use crate::http::forward::{build_client, HttpClient};
use crate::load_balancer::{backend::Backend, HashRing, HashRingBalancer, LoadBalancer, RoundRobin};

/// Routes every inbound request to one backend.
#[derive(Debug)]
pub struct Dispatcher {
    backends: Vec<Arc<Backend>>,
    balancer: Box<dyn LoadBalancer>,
    key_source: KeySource,
    client: HttpClient,
    upstream_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        backends: Vec<Arc<Backend>>,
        balancer: Box<dyn LoadBalancer>,
        key_source: KeySource,
        client: HttpClient,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            backends,
            balancer,
            key_source,
            client,
            upstream_timeout,
        }
    }

    /// Validate `config` and build backends, selector and upstream client.
    pub fn from_config(config: &BalancerConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let backends = config
            .backends
            .iter()
            .map(|address| {
                Backend::parse(address).map(Arc::new).map_err(|e| {
                    ConfigError::Validation(vec![ValidationError::InvalidBackend {
                        address: address.clone(),
                        reason: e.to_string(),
                    }])
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let balancer: Box<dyn LoadBalancer> = match config.strategy.kind {
            Strategy::RoundRobin => Box::new(RoundRobin::new()),
            Strategy::ConsistentHash => {
                let ring = HashRing::new(config.strategy.ring_size)
                    .ok_or_else(|| ConfigError::Validation(vec![ValidationError::ZeroRingSize]))?;
                Box::new(HashRingBalancer::with_backends(ring, &backends)?)
            }
        };

        let client = build_client(Duration::from_secs(config.timeouts.connect_secs));

        Ok(Self::new(
            backends,
            balancer,
            config.strategy.hash_key.clone(),
            client,
            Duration::from_secs(config.timeouts.upstream_secs),
        ))
    }

    /// The fixed backend list, in configuration order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Name of the active selection strategy.
    pub fn strategy(&self) -> &'static str {
        self.balancer.name()
    }

    /// Ring key for a request with `headers` from `peer`.
    pub fn request_key(&self, headers: &HeaderMap, peer: SocketAddr) -> String {
        match &self.key_source {
            KeySource::Random => Uuid::new_v4().to_string(),
            KeySource::ClientIp => peer.ip().to_string(),
            KeySource::Header(name) => headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| peer.ip().to_string()),
        }
    }

    /// Select the backend for a request without contacting it.
    pub fn select(&self, headers: &HeaderMap, peer: SocketAddr) -> Result<Arc<Backend>, BalancerError> {
        let key = self.request_key(headers, peer);
        self.balancer.next_server(&self.backends, &key)
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: Request<Body>, peer: SocketAddr) -> Response {
        let backend = match self.select(request.headers(), peer) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(
                    strategy = self.strategy(),
                    kind = e.kind(),
                    error = %e,
                    "Backend selection failed"
                );
                return e.into_response();
            }
        };

        match backend
            .forward(&self.client, request, peer, self.upstream_timeout)
            .await
        {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }
}
