//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → circuit_breaker.rs pre (reject fast when the server is Close or sampled out)
//!     → backend call
//!     → circuit_breaker.rs post / post_err (promote or demote the breaker)
//! ```
//!
//! # Design Decisions
//! - Circuit breaker prevents cascading failures
//! - Breaker decisions read sliding-window counts from the analysis subsystem
//! - All resilience logic plugs into the filter chain

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerFilter, CircuitStatus};
