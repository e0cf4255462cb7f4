//! API gateway dispatch and circuit-breaking core.

pub mod admin;
pub mod analysis;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod routing;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use proxy::{Dispatcher, GatewayError, SyncError};
