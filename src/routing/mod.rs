//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, host, path, headers)
//!     → api.rs (first API, in precedence order, whose predicate matches)
//!     → rule.rs (first routing override that matches replaces the node's cluster)
//!     → matcher.rs (evaluate match conditions)
//!
//! Definition Compilation (on every table update):
//!     ApiConfig / RoutingConfig
//!     → Compile matchers
//!     → Sort by (priority desc, registration order)
//!     → Published as part of an immutable routing table snapshot
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same API
//! - First match wins (ordered by priority, then registration)

pub mod api;
pub mod matcher;
pub mod rule;

pub use api::{Api, Node};
pub use matcher::{Matcher, RuleError};
pub use rule::Routing;
