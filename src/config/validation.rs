//! Configuration validation.
//!
//! # Responsibilities
//! - Check every backend URL parses and uses a supported scheme
//! - Validate value ranges (ring size, timeouts, bind address)
//! - Reject ring topologies that cannot be built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Any error aborts startup; nothing degrades at runtime

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BalancerConfig, Strategy};
use crate::error::BalancerError;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one backend is required")]
    NoBackends,

    #[error("invalid backend address '{address}': {reason}")]
    InvalidBackend { address: String, reason: String },

    #[error("backend '{address}' uses unsupported scheme '{scheme}' (only http is supported)")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("backend '{address}' is listed more than once")]
    DuplicateBackend { address: String },

    #[error("ring size must be greater than zero")]
    ZeroRingSize,

    #[error("ring size {ring_size} cannot hold {backends} backends")]
    RingTooSmall { ring_size: usize, backends: usize },

    #[error("invalid bind address '{address}': {reason}")]
    InvalidBindAddress { address: String, reason: String },

    #[error("timeout '{name}' must be greater than zero")]
    ZeroTimeout { name: &'static str },

    #[error("request timeout ({request_secs}s) must exceed upstream timeout ({upstream_secs}s)")]
    RequestTimeoutTooShort { request_secs: u64, upstream_secs: u64 },
}

/// Error type for building the balancer from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("failed to build hash ring: {0}")]
    Ring(#[from] BalancerError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::InvalidBindAddress {
            address: config.listener.bind_address.clone(),
            reason: e.to_string(),
        });
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for address in &config.backends {
        match Url::parse(address) {
            Ok(url) if url.scheme() != "http" => errors.push(ValidationError::UnsupportedScheme {
                address: address.clone(),
                scheme: url.scheme().to_string(),
            }),
            Ok(url) if url.host_str().is_none() => errors.push(ValidationError::InvalidBackend {
                address: address.clone(),
                reason: "missing host".to_string(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidBackend {
                address: address.clone(),
                reason: e.to_string(),
            }),
        }

        // The ring places a repeated address twice and can only remove one copy.
        if config.strategy.kind == Strategy::ConsistentHash && !seen.insert(address.as_str()) {
            errors.push(ValidationError::DuplicateBackend {
                address: address.clone(),
            });
        }
    }

    if config.strategy.kind == Strategy::ConsistentHash {
        if config.strategy.ring_size == 0 {
            errors.push(ValidationError::ZeroRingSize);
        } else if config.strategy.ring_size < config.backends.len() {
            errors.push(ValidationError::RingTooSmall {
                ring_size: config.strategy.ring_size,
                backends: config.backends.len(),
            });
        }
    }

    for (name, secs) in [
        ("connect", config.timeouts.connect_secs),
        ("upstream", config.timeouts.upstream_secs),
        ("request", config.timeouts.request_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout { name });
        }
    }

    // A slow backend must time out as a 502 before the request layer answers 504.
    let timeouts = &config.timeouts;
    if timeouts.upstream_secs > 0 && timeouts.request_secs > 0 && timeouts.request_secs <= timeouts.upstream_secs {
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_secs: timeouts.request_secs,
            upstream_secs: timeouts.upstream_secs,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
