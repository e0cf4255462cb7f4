//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → Dispatcher::reload (diffed into one atomic table update)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → update channel → Dispatcher::reload
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes go through the dispatcher
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, ApiConfig, BindConfig, CircuitBreakerConfig, ClusterConfig, GatewayConfig,
    HeaderMatchConfig, HealthCheckConfig, ListenerConfig, LoadBalance, MatchConfig, NodeConfig,
    ObservabilityConfig, RoutingConfig, ServerConfig, TimeoutConfig,
};
