//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (binds, nodes and routings reference existing entities)
//! - Validate value ranges (rates within 0..=100, windows > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{CircuitBreakerConfig, GatewayConfig};

/// A semantic configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },

    #[error("server `{server}` has invalid address `{addr}`")]
    InvalidAddress { server: String, addr: String },

    #[error("server `{server}`: {field} = {value} is not a percentage")]
    RateOutOfRange {
        server: String,
        field: &'static str,
        value: u32,
    },

    #[error("server `{server}`: {field} must be greater than zero")]
    ZeroWindow { server: String, field: &'static str },

    #[error("{owner} references unknown {kind} `{name}`")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        name: String,
    },

    #[error("api `{0}` has no nodes")]
    EmptyApi(String),

    #[error("health_check.interval_secs must be greater than zero")]
    ZeroInterval,
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let servers = unique_names(config.servers.iter().map(|s| s.id.as_str()), "server", &mut errors);
    let clusters = unique_names(config.clusters.iter().map(|c| c.id.as_str()), "cluster", &mut errors);
    let apis = unique_names(config.apis.iter().map(|a| a.name.as_str()), "api", &mut errors);
    unique_names(config.routings.iter().map(|r| r.name.as_str()), "routing", &mut errors);

    for server in &config.servers {
        if Url::parse(&format!("http://{}", server.addr)).is_err() {
            errors.push(ValidationError::InvalidAddress {
                server: server.id.clone(),
                addr: server.addr.clone(),
            });
        }
        if let Some(cb) = &server.circuit_breaker {
            validate_policy(&server.id, cb, &mut errors);
        }
    }

    for bind in &config.binds {
        let owner = format!("bind <{},{}>", bind.server, bind.cluster);
        check_ref(&servers, &owner, "server", &bind.server, &mut errors);
        check_ref(&clusters, &owner, "cluster", &bind.cluster, &mut errors);
    }

    for api in &config.apis {
        if api.nodes.is_empty() {
            errors.push(ValidationError::EmptyApi(api.name.clone()));
        }
        let owner = format!("api `{}`", api.name);
        for node in &api.nodes {
            check_ref(&clusters, &owner, "cluster", &node.cluster, &mut errors);
        }
    }

    for routing in &config.routings {
        let owner = format!("routing `{}`", routing.name);
        check_ref(&clusters, &owner, "cluster", &routing.cluster, &mut errors);
        if let Some(api) = &routing.api {
            check_ref(&apis, &owner, "api", api, &mut errors);
        }
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn unique_names<'a>(
    names: impl Iterator<Item = &'a str>,
    kind: &'static str,
    errors: &mut Vec<ValidationError>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            errors.push(ValidationError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
    }
    seen
}

fn check_ref(
    known: &HashSet<&str>,
    owner: &str,
    kind: &'static str,
    name: &str,
    errors: &mut Vec<ValidationError>,
) {
    if !known.contains(name) {
        errors.push(ValidationError::UnknownReference {
            owner: owner.to_string(),
            kind,
            name: name.to_string(),
        });
    }
}

/// Check one breaker policy: rates are percentages and windows are non-zero.
pub fn validate_policy(server: &str, cb: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    let rates = [
        ("open_to_close_rate", cb.open_to_close_rate),
        ("half_to_open_rate", cb.half_to_open_rate),
        ("half_traffic_rate", cb.half_traffic_rate),
    ];
    for (field, value) in rates {
        if value > 100 {
            errors.push(ValidationError::RateOutOfRange {
                server: server.to_string(),
                field,
                value,
            });
        }
    }

    let windows = [
        ("open_to_close_secs", cb.open_to_close_secs),
        ("half_to_open_secs", cb.half_to_open_secs),
    ];
    for (field, secs) in windows {
        if secs == 0 {
            errors.push(ValidationError::ZeroWindow {
                server: server.to_string(),
                field,
            });
        }
    }
}
