//! Cluster runtime.
//!
//! # Responsibilities
//! - Hold the ordered member list of one cluster
//! - Delegate member selection to the cluster's load balancing strategy
//!
//! Clusters live inside the routing table snapshot and are copied on write;
//! the strategy (and its rotation state) is shared between copies.

use std::sync::Arc;
use axum::body::Body;
use axum::http::Request;

use crate::config::{ClusterConfig, LoadBalance};
use crate::load_balancer::{self, LoadBalancer};

/// A named group of servers with a selection strategy.
#[derive(Debug, Clone)]
pub struct ClusterRuntime {
    id: String,
    load_balance: LoadBalance,
    members: Vec<String>,
    lb: Arc<dyn LoadBalancer>,
}

impl ClusterRuntime {
    /// Create an empty cluster.
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            id: config.id.clone(),
            load_balance: config.load_balance,
            members: Vec::new(),
            lb: load_balancer::build(config.load_balance),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn load_balance(&self) -> LoadBalance {
        self.load_balance
    }

    /// Switch strategy, keeping members.
    pub fn set_load_balance(&mut self, load_balance: LoadBalance) {
        if self.load_balance != load_balance {
            self.load_balance = load_balance;
            self.lb = load_balancer::build(load_balance);
        }
    }

    /// Member server ids in bind order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, server_id: &str) -> bool {
        self.members.iter().any(|m| m == server_id)
    }

    /// Add a member. Returns false if it was already present.
    pub fn add(&mut self, server_id: &str) -> bool {
        if self.contains(server_id) {
            return false;
        }
        self.members.push(server_id.to_string());
        true
    }

    /// Remove a member. Returns false if it was absent.
    pub fn remove(&mut self, server_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != server_id);
        self.members.len() != before
    }

    /// Pick the member id that should serve `req`.
    pub fn select_server(&self, req: &Request<Body>) -> Option<&str> {
        self.lb.next_server(req, &self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> ClusterRuntime {
        ClusterRuntime::new(&ClusterConfig {
            id: "c1".into(),
            load_balance: LoadBalance::RoundRobin,
        })
    }

    #[test]
    fn test_membership() {
        let mut c = cluster();
        assert!(c.add("s1"));
        assert!(!c.add("s1"));
        assert!(c.add("s2"));
        assert_eq!(c.members(), ["s1".to_string(), "s2".to_string()]);

        assert!(c.remove("s1"));
        assert!(!c.remove("s1"));
        assert_eq!(c.members(), ["s2".to_string()]);
    }

    #[test]
    fn test_select_delegates_to_strategy() {
        let mut c = cluster();
        let req = Request::new(Body::empty());
        assert_eq!(c.select_server(&req), None);

        c.add("s1");
        c.add("s2");
        assert_eq!(c.select_server(&req), Some("s1"));
        assert_eq!(c.select_server(&req), Some("s2"));
    }

    #[test]
    fn test_switch_strategy_keeps_members() {
        let mut c = cluster();
        c.add("s1");
        c.set_load_balance(LoadBalance::Random);
        assert_eq!(c.load_balance(), LoadBalance::Random);
        assert!(c.contains("s1"));
    }
}
