//! Configuration schema definitions.
//!
//! Every section carries a `Default` so callers only set what they change.

use axum::http::HeaderName;
use std::fmt;
use std::str::FromStr;

/// Root configuration for the balancer.
#[derive(Debug, Clone, Default)]
pub struct BalancerConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Upstream base URLs, in selection order.
    pub backends: Vec<String>,

    /// Selection strategy settings.
    pub strategy: StrategyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Backend selection strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Rotate through the backend list.
    RoundRobin,
    /// Look the request key up on a hash ring.
    #[default]
    ConsistentHash,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RoundRobin => write!(f, "round-robin"),
            Strategy::ConsistentHash => write!(f, "consistent-hash"),
        }
    }
}

/// Where the per-request ring key comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeySource {
    /// A fresh UUID per request. Spreads load, gives no affinity.
    #[default]
    Random,
    /// The peer IP address, so each client sticks to one backend.
    ClientIp,
    /// The value of the named header, falling back to the peer IP.
    Header(String),
}

impl FromStr for KeySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(KeySource::Random),
            "client-ip" => Ok(KeySource::ClientIp),
            _ => match s.strip_prefix("header:") {
                Some(name) => HeaderName::from_bytes(name.trim().as_bytes())
                    .map(|name| KeySource::Header(name.as_str().to_string()))
                    .map_err(|_| format!("invalid header name '{}' in hash key source", name)),
                None => Err(format!(
                    "invalid hash key source '{}': expected random, client-ip or header:<name>",
                    s
                )),
            },
        }
    }
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Random => write!(f, "random"),
            KeySource::ClientIp => write!(f, "client-ip"),
            KeySource::Header(name) => write!(f, "header:{}", name),
        }
    }
}

/// Selection strategy settings.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Which selector to use.
    pub kind: Strategy,

    /// Total slot count of the hash ring.
    pub ring_size: usize,

    /// Source of the per-request ring key.
    pub hash_key: KeySource,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: Strategy::default(),
            ring_size: 1024,
            hash_key: KeySource::default(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time to wait for the upstream response head in seconds.
    pub upstream_secs: u64,

    /// Overall inbound request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
