//! Response handling and transformation.
//!
//! # Responsibilities
//! - Transform backend responses for the client (streamed, hop-by-hop stripped)
//! - Render [`GatewayError`] with its status and `x-gateway-error` signal

use axum::body::Body;
use axum::http::{HeaderValue, Response};
use axum::response::IntoResponse;

use crate::http::request::strip_hop_by_hop;
use crate::proxy::GatewayError;

pub const X_GATEWAY_ERROR: &str = "x-gateway-error";

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status(), self.to_string()).into_response();
        response
            .headers_mut()
            .insert(X_GATEWAY_ERROR, HeaderValue::from_static(self.signal()));
        response
    }
}

/// Prepare a backend response for the client. The body is streamed.
pub fn from_backend(response: Response<Body>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_response() {
        let response = GatewayError::CircuitHalfLimited.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[X_GATEWAY_ERROR], "circuit-half-limited");
    }

    #[test]
    fn test_from_backend_strips_headers() {
        let backend = Response::builder()
            .status(StatusCode::CREATED)
            .header("transfer-encoding", "chunked")
            .header("x-backend", "s1")
            .body(Body::empty())
            .unwrap();

        let response = from_backend(backend);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(!response.headers().contains_key("transfer-encoding"));
        assert_eq!(response.headers()["x-backend"], "s1");
    }
}
