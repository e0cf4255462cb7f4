//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use axum::body::Body;
use axum::http::Request;
use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
/// Stores an internal counter to rotate through members.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server<'a>(&self, _req: &Request<Body>, members: &'a [String]) -> Option<&'a str> {
        if members.is_empty() {
            return None;
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % members.len();
        Some(members[index].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let req = Request::new(Body::empty());
        let members = vec!["s1".to_string(), "s2".to_string()];

        assert_eq!(lb.next_server(&req, &members), Some("s1"));
        assert_eq!(lb.next_server(&req, &members), Some("s2"));
        assert_eq!(lb.next_server(&req, &members), Some("s1"));
    }

    #[test]
    fn test_empty_members() {
        let lb = RoundRobin::new();
        let req = Request::new(Body::empty());
        assert_eq!(lb.next_server(&req, &[]), None);
    }
}
