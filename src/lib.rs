//! HTTP load balancer with round-robin and consistent-hash backend selection.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::BalancerConfig;
pub use dispatcher::Dispatcher;
pub use error::BalancerError;
pub use http::BalancerServer;
pub use lifecycle::Shutdown;
