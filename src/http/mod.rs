//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → Dispatcher::handle (select backend)
//!     → forward.rs (rewrite URI, strip hop-by-hop headers, upstream client)
//!     → Stream response to client
//! ```

pub mod forward;
pub mod server;

pub use server::BalancerServer;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";
