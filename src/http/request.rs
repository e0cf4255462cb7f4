//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the request ID set by the request-id layer
//! - Strip hop-by-hop headers
//! - Build the request forwarded to a backend server

use std::net::IpAddr;
use axum::body::{Body, Bytes};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use axum::http::request::Parts;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{Request, Uri};

use crate::load_balancer::ServerRuntime;
use crate::proxy::GatewayError;

pub const X_REQUEST_ID: &str = "x-request-id";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that apply to a single connection and are never forwarded.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Request ID of a request, `"unknown"` if the layer did not set one.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Remove hop-by-hop headers, including those listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// URI of `path_and_query` on `server`.
///
/// Scheme and authority always come from the server; the path is taken
/// verbatim, so a path such as `//other.host/x` stays a path on the server.
pub fn backend_uri(server: &ServerRuntime, path_and_query: &str) -> Result<Uri, GatewayError> {
    let path_and_query = if path_and_query.starts_with('/') {
        PathAndQuery::try_from(path_and_query)
    } else {
        PathAndQuery::try_from(format!("/{path_and_query}"))
    }
    .map_err(|e| GatewayError::InvalidRequest(format!("bad backend path: {e}")))?;

    let mut parts = axum::http::uri::Parts::default();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(server.authority().clone());
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).map_err(|e| GatewayError::InvalidRequest(format!("bad backend uri: {e}")))
}

/// Build the request sent to `server` for `path_and_query`.
///
/// The original headers are kept (minus hop-by-hop ones) and the client
/// address is appended to `X-Forwarded-For`.
pub fn backend_request(
    parts: &Parts,
    body: Bytes,
    server: &ServerRuntime,
    path_and_query: &str,
    client_ip: Option<IpAddr>,
) -> Result<Request<Body>, GatewayError> {
    let uri = backend_uri(server, path_and_query)?;

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);

    if let Some(ip) = client_ip {
        let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{existing}, {ip}"),
            None => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .body(Body::from(body))
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    *request.headers_mut() = headers;
    Ok(request)
}
