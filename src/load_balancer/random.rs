//! Uniform random load balancing strategy.

use axum::body::Body;
use axum::http::Request;
use crate::load_balancer::LoadBalancer;

/// Picks a member uniformly at random.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_server<'a>(&self, _req: &Request<Body>, members: &'a [String]) -> Option<&'a str> {
        if members.is_empty() {
            return None;
        }
        Some(members[fastrand::usize(..members.len())].as_str())
    }
}
