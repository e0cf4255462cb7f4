//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files. The
//! entity types (servers, clusters, binds, apis, routings) double as payloads
//! of configuration-sync events.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Backend server definitions.
    pub servers: Vec<ServerConfig>,

    /// Cluster definitions.
    pub clusters: Vec<ClusterConfig>,

    /// Server to cluster memberships.
    pub binds: Vec<BindConfig>,

    /// API definitions, in registration order.
    pub apis: Vec<ApiConfig>,

    /// Routing overrides, in registration order.
    pub routings: Vec<RoutingConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body buffered for forwarding.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Unique server identifier. Also the analysis key.
    pub id: String,

    /// Backend address (e.g., "127.0.0.1:3000").
    pub addr: String,

    /// Circuit breaker policy. Absent means the breaker never trips.
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    /// Health probe path overriding `health_check.path`.
    #[serde(default)]
    pub health_check_path: Option<String>,
}

/// Circuit breaker policy of one server.
///
/// Rates are percentages in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Failure percentage that trips Open into Close.
    pub open_to_close_rate: u32,

    /// Window used for the Open to Close failure rate, in seconds.
    pub open_to_close_secs: u64,

    /// Success percentage that promotes Half into Open.
    pub half_to_open_rate: u32,

    /// Window used for Half state statistics, in seconds.
    pub half_to_open_secs: u64,

    /// Percentage of traffic admitted while Half.
    pub half_traffic_rate: u32,
}

/// Load balancing strategy of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalance {
    #[default]
    RoundRobin,
    Random,
    IpHash,
}

/// Cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Unique cluster identifier.
    pub id: String,

    #[serde(default)]
    pub load_balance: LoadBalance,
}

/// Membership of one server in one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct BindConfig {
    pub server: String,
    pub cluster: String,
}

/// Request predicate shared by APIs and routing overrides.
///
/// Every present condition must hold. An empty predicate matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchConfig {
    /// HTTP method (case-insensitive).
    pub method: Option<String>,

    /// Host header (exact, case-insensitive).
    pub host: Option<String>,

    /// Path prefix (case-sensitive).
    pub path_prefix: Option<String>,

    /// Header conditions.
    pub headers: Vec<HeaderMatchConfig>,
}

/// A header condition. Without a value only presence is checked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderMatchConfig {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// API definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Unique API name.
    pub name: String,

    /// Precedence (higher = checked first). Ties keep registration order.
    #[serde(default)]
    pub priority: u32,

    #[serde(flatten)]
    pub matches: MatchConfig,

    /// Destinations. More than one node makes the API a merge API.
    pub nodes: Vec<NodeConfig>,
}

/// One destination of an API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Default cluster for this node.
    pub cluster: String,

    /// Path template applied before forwarding; `{path}` is the original path.
    #[serde(default)]
    pub rewrite: Option<String>,
}

/// Routing override redirecting matched traffic to another cluster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Unique routing name.
    pub name: String,

    /// Precedence (higher = checked first). Ties keep registration order.
    #[serde(default)]
    pub priority: u32,

    /// Restrict the override to one API.
    #[serde(default)]
    pub api: Option<String>,

    /// Target cluster.
    pub cluster: String,

    #[serde(flatten)]
    pub matches: MatchConfig,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active recovery probes.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
        }
    }
}

/// Timeout configuration for backend calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Backend request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
