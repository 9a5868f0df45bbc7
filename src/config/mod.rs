//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line / environment
//!     → cli.rs (clap parse)
//!     → BalancerConfig (schema.rs, defaults filled in)
//!     → validation.rs (semantic checks)
//!     → Dispatcher::from_config (backends, selector, client)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no runtime reconfiguration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (clap) from semantic checks

pub mod cli;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use schema::{
    BalancerConfig, KeySource, ListenerConfig, ObservabilityConfig, Strategy, StrategyConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ConfigError, ValidationError};
