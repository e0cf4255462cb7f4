//! Dispatch nodes.
//!
//! A [`DispatchNode`] is the per-request unit of work for one (API, node)
//! pair. The request owns it; dropping it releases the response buffer and the
//! server's in-flight slot on every exit path.

use std::sync::Arc;
use axum::body::Body;
use axum::http::{Response, StatusCode};

use crate::load_balancer::{InFlightGuard, ServerRuntime};
use crate::proxy::error::GatewayError;
use crate::routing::{Api, Node};

#[derive(Debug)]
pub struct DispatchNode {
    api: Arc<Api>,
    node: Node,
    cluster: String,
    dest: Option<InFlightGuard>,
    response: Option<Response<Body>>,
    code: Option<StatusCode>,
    error: Option<GatewayError>,
}

impl DispatchNode {
    /// `cluster` is the resolved cluster (after routing overrides).
    pub fn new(api: Arc<Api>, node: Node, cluster: String, dest: Option<Arc<ServerRuntime>>) -> Self {
        Self {
            api,
            node,
            cluster,
            dest: dest.as_ref().map(ServerRuntime::track),
            response: None,
            code: None,
            error: None,
        }
    }

    pub fn api(&self) -> &Arc<Api> {
        &self.api
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Selected server, `None` when the cluster or server did not resolve.
    pub fn dest(&self) -> Option<&Arc<ServerRuntime>> {
        self.dest.as_ref().map(InFlightGuard::server)
    }

    pub fn is_merge(&self) -> bool {
        self.api.is_merge()
    }

    pub fn code(&self) -> Option<StatusCode> {
        self.code
    }

    pub fn error(&self) -> Option<&GatewayError> {
        self.error.as_ref()
    }

    pub fn response(&self) -> Option<&Response<Body>> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: Response<Body>) {
        self.code = Some(response.status());
        self.response = Some(response);
    }

    pub fn fail(&mut self, error: GatewayError) {
        self.code = Some(error.status());
        self.error = Some(error);
    }

    /// Take the outcome out of the node. Without a response or error the
    /// node never resolved a destination.
    pub fn take_outcome(&mut self) -> Result<Response<Body>, GatewayError> {
        if let Some(response) = self.response.take() {
            return Ok(response);
        }
        Err(self
            .error
            .take()
            .unwrap_or_else(|| GatewayError::NoServer(self.cluster.clone())))
    }
}
