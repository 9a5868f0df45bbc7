//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!
//! Per request:
//!     → x-request-id assigned at the edge, forwarded upstream, echoed back
//!     → "Forwarding request" event names the chosen backend
//! ```

pub mod logging;
