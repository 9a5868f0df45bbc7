//! Command-line and environment configuration.

use clap::Parser;

use crate::config::schema::{
    BalancerConfig, KeySource, ListenerConfig, ObservabilityConfig, Strategy, StrategyConfig,
    TimeoutConfig,
};

#[derive(Debug, Parser)]
#[command(name = "ring-balancer")]
#[command(about = "HTTP load balancer with round-robin and consistent-hash selection", long_about = None)]
pub struct Cli {
    /// Port to listen on.
    #[arg(short, long, env = "LB_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Host/IP to bind the listener to.
    #[arg(long, env = "LB_BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: String,

    /// Upstream base URL. Repeat the flag or pass a comma-separated list.
    #[arg(short, long = "backend", env = "LB_BACKENDS", value_delimiter = ',', required = true)]
    pub backends: Vec<String>,

    /// Backend selection strategy.
    #[arg(short, long, env = "LB_STRATEGY", value_enum, default_value_t = Strategy::ConsistentHash)]
    pub strategy: Strategy,

    /// Total number of slots on the hash ring.
    #[arg(long, env = "LB_RING_SIZE", default_value_t = 1024)]
    pub ring_size: usize,

    /// Ring key per request: random, client-ip or header:<name>.
    #[arg(long, env = "LB_HASH_KEY", default_value = "random")]
    pub hash_key: KeySource,

    /// Backend connect timeout in seconds.
    #[arg(long, env = "LB_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Seconds to wait for a backend's response head.
    #[arg(long, env = "LB_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// Overall request timeout in seconds; must exceed the upstream timeout.
    #[arg(long, env = "LB_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Log level when RUST_LOG is unset.
    #[arg(long, env = "LB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Convert parsed arguments into a balancer configuration.
    pub fn into_config(self) -> BalancerConfig {
        let bind_address = if self.bind_host.contains(':') {
            format!("[{}]:{}", self.bind_host, self.port)
        } else {
            format!("{}:{}", self.bind_host, self.port)
        };

        BalancerConfig {
            listener: ListenerConfig { bind_address },
            backends: self
                .backends
                .into_iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
            strategy: StrategyConfig {
                kind: self.strategy,
                ring_size: self.ring_size,
                hash_key: self.hash_key,
            },
            timeouts: TimeoutConfig {
                connect_secs: self.connect_timeout_secs,
                upstream_secs: self.upstream_timeout_secs,
                request_secs: self.request_timeout_secs,
            },
            observability: ObservabilityConfig {
                log_level: self.log_level,
            },
        }
    }
}
