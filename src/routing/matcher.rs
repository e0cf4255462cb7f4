//! Request matching logic.
//!
//! # Responsibilities
//! - Match method (exact)
//! - Match host header (exact match, case-insensitive)
//! - Match path prefix (case-sensitive)
//! - Match header presence or value
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive
//! - Empty condition = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method, Request};
use thiserror::Error;

use crate::config::MatchConfig;

/// A predicate that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    #[error("invalid header name `{0}`")]
    InvalidHeaderName(String),

    #[error("invalid header value for `{0}`")]
    InvalidHeaderValue(String),
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        *req.method() == self.method
    }
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get("host")
            .and_then(|h| h.to_str().ok())
            .map(|h| h.to_lowercase() == self.expected_host)
            .unwrap_or(false)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path().starts_with(&self.prefix)
    }
}

/// Matches a header by presence, or by exact value when one is given.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<HeaderValue>,
}

impl HeaderMatcher {
    pub fn new(name: HeaderName, value: Option<HeaderValue>) -> Self {
        Self { name, value }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        match (&self.value, req.headers().get(&self.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        }
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Compile a predicate from configuration.
    pub fn compile(config: &MatchConfig) -> Result<Self, RuleError> {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();

        if let Some(method) = &config.method {
            let parsed = Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|_| RuleError::InvalidMethod(method.clone()))?;
            matchers.push(Box::new(MethodMatcher::new(parsed)));
        }
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.as_str())));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.as_str())));
        }
        for header in &config.headers {
            let name = HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|_| RuleError::InvalidHeaderName(header.name.clone()))?;
            let value = header
                .value
                .as_deref()
                .map(HeaderValue::from_str)
                .transpose()
                .map_err(|_| RuleError::InvalidHeaderValue(header.name.clone()))?;
            matchers.push(Box::new(HeaderMatcher::new(name, value)));
        }

        Ok(Self::new(matchers))
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeaderMatchConfig;

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("example.com");

        let req1 = Request::builder()
            .header("Host", "example.com")
            .body(Body::default())
            .unwrap();
        assert!(matcher.matches(&req1));

        let req2 = Request::builder()
            .header("Host", "EXAMPLE.COM")
            .body(Body::default())
            .unwrap();
        assert!(matcher.matches(&req2)); // Case insensitive

        let req3 = Request::builder()
            .header("Host", "other.com")
            .body(Body::default())
            .unwrap();
        assert!(!matcher.matches(&req3));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");

        let req1 = Request::builder()
            .uri("http://example.com/api/v1")
            .body(Body::default())
            .unwrap();
        assert!(matcher.matches(&req1));

        let req2 = Request::builder()
            .uri("http://example.com/images")
            .body(Body::default())
            .unwrap();
        assert!(!matcher.matches(&req2));
    }

    #[test]
    fn test_header_matcher() {
        let presence = HeaderMatcher::new(HeaderName::from_static("x-canary"), None);
        let exact = HeaderMatcher::new(
            HeaderName::from_static("x-canary"),
            Some(HeaderValue::from_static("on")),
        );

        let on = Request::builder().header("X-Canary", "on").body(Body::default()).unwrap();
        let off = Request::builder().header("x-canary", "off").body(Body::default()).unwrap();
        let none = Request::new(Body::default());

        assert!(presence.matches(&on) && presence.matches(&off));
        assert!(!presence.matches(&none));
        assert!(exact.matches(&on));
        assert!(!exact.matches(&off));
    }

    #[test]
    fn test_compile() {
        let matcher = AndMatcher::compile(&MatchConfig {
            method: Some("post".into()),
            host: None,
            path_prefix: Some("/orders".into()),
            headers: vec![HeaderMatchConfig {
                name: "x-tenant".into(),
                value: Some("acme".into()),
            }],
        })
        .unwrap();

        let hit = Request::builder()
            .method("POST")
            .uri("/orders/1")
            .header("x-tenant", "acme")
            .body(Body::default())
            .unwrap();
        let wrong_method = Request::builder()
            .method("GET")
            .uri("/orders/1")
            .header("x-tenant", "acme")
            .body(Body::default())
            .unwrap();

        assert!(matcher.matches(&hit));
        assert!(!matcher.matches(&wrong_method));
        assert!(AndMatcher::compile(&MatchConfig::default()).unwrap().matches(&wrong_method));
    }

    #[test]
    fn test_compile_rejects_bad_header() {
        let config = MatchConfig {
            headers: vec![HeaderMatchConfig {
                name: "bad header".into(),
                value: None,
            }],
            ..Default::default()
        };
        assert_eq!(
            AndMatcher::compile(&config).unwrap_err(),
            RuleError::InvalidHeaderName("bad header".into())
        );
    }
}
