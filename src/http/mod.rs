//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → proxy::Dispatcher (API, routing override, server)
//!     → filter chain pre (circuit breaker)
//!     → request.rs (build backend request, strip hop-by-hop headers)
//!     → hyper client (per-call timeout)
//!     → filter chain post / post_err
//!     → response.rs (backend response or GatewayError) → client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
