//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (lifecycle::Scheduler)
//!     → Probe each server whose breaker is Close
//!     → Successful probe: Close → Half
//! ```
//!
//! # Design Decisions
//! - Probing is the only automatic way out of Close
//! - Servers that are Open or Half are judged by live traffic, not probes
//! - A failed probe changes nothing

pub mod active;

pub use active::HealthChecker;
