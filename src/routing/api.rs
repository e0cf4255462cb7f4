//! API definitions.
//!
//! An API is a compiled predicate plus the ordered nodes a matching request is
//! dispatched to. APIs are immutable; an update replaces the whole value.

use std::cmp::Reverse;
use axum::body::Body;
use axum::http::{Request, Uri};

use crate::config::{ApiConfig, NodeConfig};
use crate::proxy::error::SyncError;
use crate::routing::matcher::{AndMatcher, Matcher};

/// Placeholder in rewrite templates replaced by the original path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// One destination of an API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    cluster: String,
    rewrite: Option<String>,
}

impl From<&NodeConfig> for Node {
    fn from(config: &NodeConfig) -> Self {
        Self {
            cluster: config.cluster.clone(),
            rewrite: config.rewrite.clone().filter(|r| !r.is_empty()),
        }
    }
}

impl Node {
    /// Default cluster of this node.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn needs_rewrite(&self) -> bool {
        self.rewrite.is_some()
    }

    /// Path and query forwarded to the backend.
    ///
    /// The query of the original request is kept unless the template sets one.
    pub fn path_and_query(&self, uri: &Uri) -> String {
        let Some(template) = &self.rewrite else {
            return uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
        };

        let mut rewritten = template.replace(PATH_PLACEHOLDER, uri.path());
        if let Some(query) = uri.query() {
            if !rewritten.contains('?') {
                rewritten.push('?');
                rewritten.push_str(query);
            }
        }
        rewritten
    }
}

/// A compiled API definition.
#[derive(Debug)]
pub struct Api {
    config: ApiConfig,
    seq: u64,
    matcher: AndMatcher,
    nodes: Vec<Node>,
}

impl Api {
    /// Compile an API. `seq` is its registration order.
    pub fn new(config: ApiConfig, seq: u64) -> Result<Self, SyncError> {
        if config.nodes.is_empty() {
            return Err(SyncError::EmptyApi(config.name.clone()));
        }
        let matcher = AndMatcher::compile(&config.matches)?;
        let nodes = config.nodes.iter().map(Node::from).collect();

        Ok(Self {
            config,
            seq,
            matcher,
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Sort key: higher priority first, then earlier registration.
    pub fn precedence(&self) -> (Reverse<u32>, u64) {
        (Reverse(self.config.priority), self.seq)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Requests fan out to several nodes whose responses are merged.
    pub fn is_merge(&self) -> bool {
        self.nodes.len() > 1
    }

    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.matcher.matches(req)
    }
}
