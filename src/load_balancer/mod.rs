//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request key derived by the dispatcher
//!     → LoadBalancer::next_server (selection under the selector's lock):
//!         - round_robin.rs (rotate through backends)
//!         - consistent_hash.rs (hash ring lookup by key)
//!     → backend.rs (forward request, lock released)
//!     → Return upstream response or error
//! ```
//!
//! # Design Decisions
//! - Backend list is fixed at startup; selectors hold their own state
//! - Dead backends are skipped by both strategies
//! - Selection never blocks on I/O

pub mod backend;
pub mod consistent_hash;
pub mod round_robin;

use std::sync::Arc;

use crate::error::BalancerError;
use backend::Backend;

pub use consistent_hash::{hash_slot, HashRing, HashRingBalancer};
pub use round_robin::RoundRobin;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Choose one backend for a request identified by `key`.
    ///
    /// Strategies that do not route by key ignore it.
    fn next_server(&self, backends: &[Arc<Backend>], key: &str) -> Result<Arc<Backend>, BalancerError>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}
