//! Error taxonomy for selection and forwarding.
//!
//! # Design Decisions
//! - Selection errors are topology errors: never retried, no backend contacted
//! - Upstream errors are produced only after contacting the chosen backend
//! - Every variant maps to a 5xx status for the original caller

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while selecting a backend or forwarding to it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalancerError {
    /// The backend list is empty.
    #[error("no backends available")]
    NoBackendsAvailable,

    /// Every backend in the pool is marked dead.
    #[error("no live backend")]
    NoLiveBackend,

    /// Every slot of the ring is occupied.
    #[error("hash ring full: all {ring_size} slots occupied")]
    RingFull { ring_size: usize },

    /// The ring has no occupied slots.
    #[error("hash ring is empty")]
    EmptyRing,

    /// The chosen backend could not be reached or timed out.
    #[error("upstream {address} unavailable: {reason}")]
    UpstreamUnavailable { address: String, reason: String },
}

impl BalancerError {
    /// Status code returned to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BalancerError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            BalancerError::NoBackendsAvailable
            | BalancerError::NoLiveBackend
            | BalancerError::RingFull { .. }
            | BalancerError::EmptyRing => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short machine-readable name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BalancerError::NoBackendsAvailable => "no_backends_available",
            BalancerError::NoLiveBackend => "no_live_backend",
            BalancerError::RingFull { .. } => "ring_full",
            BalancerError::EmptyRing => "empty_ring",
            BalancerError::UpstreamUnavailable { .. } => "upstream_unavailable",
        }
    }
}

impl IntoResponse for BalancerError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_errors_are_service_unavailable() {
        for err in [
            BalancerError::NoBackendsAvailable,
            BalancerError::NoLiveBackend,
            BalancerError::RingFull { ring_size: 4 },
            BalancerError::EmptyRing,
        ] {
            assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[test]
    fn upstream_error_is_bad_gateway() {
        let err = BalancerError::UpstreamUnavailable {
            address: "http://127.0.0.1:1".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "upstream_unavailable");
        assert_eq!(
            err.to_string(),
            "upstream http://127.0.0.1:1 unavailable: connection refused"
        );
    }
}
