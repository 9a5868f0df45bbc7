//! ring-balancer
//!
//! Spreads inbound HTTP requests over a fixed pool of backends.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ http::server ──▶ Dispatcher::handle        │
//!                           │   (axum, request id,     │                   │
//!                           │    trace, timeout)       ▼                   │
//!                           │                  LoadBalancer::next_server   │
//!                           │                  ├─ RoundRobin (cursor)      │
//!                           │                  └─ HashRingBalancer (ring)  │
//!                           │                          │                   │
//!     Client Response       │                          ▼                   │
//!     ◀─────────────────────┼──────────────── Backend::forward ◀───────────┼──── Backend
//!                           └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;

use ring_balancer::config::Cli;
use ring_balancer::observability::logging;
use ring_balancer::{BalancerServer, Dispatcher, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config();

    logging::init(&config.observability.log_level);

    tracing::info!("ring-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    // Builds the ring; a malformed backend or a full ring aborts startup here.
    let dispatcher = Dispatcher::from_config(&config)
        .inspect_err(|e| tracing::error!(error = %e, "Invalid configuration"))?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        strategy = %config.strategy.kind,
        hash_key = %config.strategy.hash_key,
        ring_size = config.strategy.ring_size,
        backends = config.backends.len(),
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = BalancerServer::new(dispatcher, &config.timeouts);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
