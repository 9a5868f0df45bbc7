//! Round-robin load balancing strategy.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::BalancerError;
use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
/// Stores an internal cursor to rotate through backends.
///
/// The cursor advances once per attempt, dead backends included, and the
/// whole sweep runs under one lock so concurrent callers never observe the
/// same cursor value.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor value (total attempts made so far).
    pub fn cursor(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the next alive backend from `backends`.
    pub fn pick(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, BalancerError> {
        if backends.is_empty() {
            return Err(BalancerError::NoBackendsAvailable);
        }

        let len = backends.len();
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

        // Bounded to one sweep so an all-dead pool fails instead of spinning.
        for _ in 0..len {
            let index = *cursor % len;
            *cursor = cursor.wrapping_add(1);
            let backend = &backends[index];
            if backend.is_alive() {
                return Ok(backend.clone());
            }
        }
        Err(BalancerError::NoLiveBackend)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>], _key: &str) -> Result<Arc<Backend>, BalancerError> {
        self.pick(backends)
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
