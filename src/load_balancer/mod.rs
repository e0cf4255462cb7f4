//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Cluster chosen (API node or routing override)
//!     → cluster.rs (member server ids)
//!     → Apply the cluster's strategy:
//!         - round_robin.rs (rotate through members)
//!         - random.rs (uniform pick)
//!         - ip_hash.rs (client affinity)
//!     → member id
//!     → routing table resolves server.rs (ServerRuntime)
//! ```
//!
//! # Design Decisions
//! - Strategies see member ids only; breaker state is enforced by filters
//! - Strategy selected per cluster
//! - Empty cluster yields no server (caller degrades to no-route)

pub mod cluster;
pub mod ip_hash;
pub mod random;
pub mod round_robin;
pub mod server;

use std::sync::Arc;
use axum::body::Body;
use axum::http::Request;

use crate::config::LoadBalance;

pub use cluster::ClusterRuntime;
pub use server::{InFlightGuard, ServerRuntime};

/// Trait for load balancing algorithms.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Select a member for the request, `None` when there are no members.
    fn next_server<'a>(&self, req: &Request<Body>, members: &'a [String]) -> Option<&'a str>;
}

/// Instantiate the strategy for a cluster.
pub fn build(kind: LoadBalance) -> Arc<dyn LoadBalancer> {
    match kind {
        LoadBalance::RoundRobin => Arc::new(round_robin::RoundRobin::new()),
        LoadBalance::Random => Arc::new(random::Random::new()),
        LoadBalance::IpHash => Arc::new(ip_hash::IpHash::new()),
    }
}
