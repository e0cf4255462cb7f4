//! Request-path and table-update errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::validation::ValidationError;
use crate::routing::matcher::RuleError;

/// Outcome of a request that did not produce a backend response.
///
/// Every kind carries an HTTP status hint ([`GatewayError::status`]) and a
/// stable signal tag ([`GatewayError::signal`]) so callers can tell a breaker
/// rejection from a genuine backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No API matched the request.
    #[error("no route matched")]
    NoRoute,

    /// The API matched but no live server resolved for the node.
    #[error("no server available in cluster `{0}`")]
    NoServer(String),

    /// Breaker is Close, or Open just tripped.
    #[error("server is in circuit close")]
    CircuitClosed,

    /// Breaker is Half and the request was sampled out.
    #[error("server is in circuit half, traffic limit")]
    CircuitHalfLimited,

    /// The admitted backend call failed.
    #[error("backend request failed: {0}")]
    Backend(String),

    /// The admitted backend call did not complete in time.
    #[error("backend request timed out")]
    BackendTimeout,

    /// The inbound request could not be read.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute => StatusCode::NOT_FOUND,
            GatewayError::NoServer(_)
            | GatewayError::CircuitClosed
            | GatewayError::CircuitHalfLimited => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Backend(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable tag, sent as the `x-gateway-error` header.
    pub fn signal(&self) -> &'static str {
        match self {
            GatewayError::NoRoute => "no-route",
            GatewayError::NoServer(_) => "no-server",
            GatewayError::CircuitClosed => "circuit-closed",
            GatewayError::CircuitHalfLimited => "circuit-half-limited",
            GatewayError::Backend(_) => "backend-failure",
            GatewayError::BackendTimeout => "backend-timeout",
            GatewayError::InvalidRequest(_) => "invalid-request",
        }
    }

    /// True for synthetic breaker rejections; the backend was never contacted.
    pub fn is_circuit_rejection(&self) -> bool {
        matches!(self, GatewayError::CircuitClosed | GatewayError::CircuitHalfLimited)
    }
}

/// A configuration-sync event that could not be applied.
///
/// The whole event (or batch) is discarded; the published table is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("unknown server `{0}`")]
    UnknownServer(String),

    #[error("unknown cluster `{0}`")]
    UnknownCluster(String),

    #[error("unknown api `{0}`")]
    UnknownApi(String),

    #[error("unknown routing `{0}`")]
    UnknownRouting(String),

    #[error("server `{server}` has invalid address `{addr}`")]
    InvalidAddress { server: String, addr: String },

    #[error("api `{0}` has no nodes")]
    EmptyApi(String),

    #[error(transparent)]
    InvalidPolicy(ValidationError),

    #[error(transparent)]
    Rule(#[from] RuleError),
}
