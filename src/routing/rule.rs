//! Routing overrides.
//!
//! A routing override redirects matching traffic from the API node's default
//! cluster to another cluster, optionally only for one API.

use std::cmp::Reverse;
use axum::body::Body;
use axum::http::Request;

use crate::config::RoutingConfig;
use crate::proxy::error::SyncError;
use crate::routing::matcher::{AndMatcher, Matcher};

/// A compiled routing override.
#[derive(Debug)]
pub struct Routing {
    config: RoutingConfig,
    seq: u64,
    matcher: AndMatcher,
}

impl Routing {
    /// Compile an override. `seq` is its registration order.
    pub fn new(config: RoutingConfig, seq: u64) -> Result<Self, SyncError> {
        let matcher = AndMatcher::compile(&config.matches)?;
        Ok(Self { config, seq, matcher })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Target cluster.
    pub fn cluster(&self) -> &str {
        &self.config.cluster
    }

    /// Sort key: higher priority first, then earlier registration.
    pub fn precedence(&self) -> (Reverse<u32>, u64) {
        (Reverse(self.config.priority), self.seq)
    }

    /// True if the override applies to `req` dispatched through `api`.
    pub fn matches(&self, req: &Request<Body>, api: &str) -> bool {
        let in_scope = self.config.api.as_deref().map_or(true, |scope| scope == api);
        in_scope && self.matcher.matches(req)
    }
}
