use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::admin::AdminState;
use crate::config::{LoadBalance, NodeConfig};
use crate::load_balancer::server::RATE_WINDOW;
use crate::proxy::ChangeEvent;
use crate::resilience::CircuitStatus;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub apis: usize,
    pub routings: usize,
    pub clusters: usize,
    pub servers: usize,
    pub circuits_open: usize,
    pub circuits_half: usize,
    pub circuits_close: usize,
}

#[derive(Serialize)]
pub struct RecentCounts {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
}

#[derive(Serialize)]
pub struct ServerStatus {
    pub id: String,
    pub address: String,
    pub status: CircuitStatus,
    pub circuit_breaker: bool,
    pub in_flight: usize,
    pub clusters: Vec<String>,
    pub last_second: RecentCounts,
}

#[derive(Serialize)]
pub struct ClusterStatus {
    pub id: String,
    pub load_balance: LoadBalance,
    pub members: Vec<String>,
}

#[derive(Serialize)]
pub struct ApiStatus {
    pub name: String,
    pub priority: u32,
    pub merge: bool,
    pub nodes: Vec<NodeConfig>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let table = state.dispatcher.snapshot();
    let count = |status: CircuitStatus| table.servers().filter(|s| s.status() == status).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        apis: table.apis().len(),
        routings: table.routings().len(),
        clusters: table.clusters().count(),
        servers: table.servers().count(),
        circuits_open: count(CircuitStatus::Open),
        circuits_half: count(CircuitStatus::Half),
        circuits_close: count(CircuitStatus::Close),
    })
}

pub async fn get_servers(State(state): State<AdminState>) -> Json<Vec<ServerStatus>> {
    let table = state.dispatcher.snapshot();
    let analysis = state.dispatcher.analysis();

    let mut statuses: Vec<ServerStatus> = table
        .servers()
        .map(|s| {
            let recent = analysis.recent(s.id(), RATE_WINDOW);
            ServerStatus {
                id: s.id().to_string(),
                address: s.addr().to_string(),
                status: s.status(),
                circuit_breaker: s.circuit_breaker().is_some(),
                in_flight: s.in_flight(),
                clusters: table
                    .clusters_of(s.id())
                    .map(|c| c.iter().cloned().collect())
                    .unwrap_or_default(),
                last_second: RecentCounts {
                    total: recent.total,
                    success: recent.success,
                    failure: recent.failure,
                },
            }
        })
        .collect();
    statuses.sort_by(|a, b| a.id.cmp(&b.id));

    Json(statuses)
}

pub async fn get_clusters(State(state): State<AdminState>) -> Json<Vec<ClusterStatus>> {
    let table = state.dispatcher.snapshot();
    let mut clusters: Vec<ClusterStatus> = table
        .clusters()
        .map(|c| ClusterStatus {
            id: c.id().to_string(),
            load_balance: c.load_balance(),
            members: c.members().to_vec(),
        })
        .collect();
    clusters.sort_by(|a, b| a.id.cmp(&b.id));

    Json(clusters)
}

/// APIs in match order.
pub async fn get_apis(State(state): State<AdminState>) -> Json<Vec<ApiStatus>> {
    let table = state.dispatcher.snapshot();
    Json(
        table
            .apis()
            .iter()
            .map(|api| ApiStatus {
                name: api.name().to_string(),
                priority: api.config().priority,
                merge: api.is_merge(),
                nodes: api.config().nodes.clone(),
            })
            .collect(),
    )
}

/// Manual recovery: Close → Half.
pub async fn promote_server(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let Some(server) = state.dispatcher.server(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": format!("unknown server `{id}`") })));
    };

    if server.promote_to_half() {
        tracing::info!(server = %id, "Server promoted to half by admin");
        (StatusCode::OK, Json(json!({ "id": id, "status": server.status() })))
    } else {
        (
            StatusCode::CONFLICT,
            Json(json!({ "error": "server is not in circuit close", "status": server.status() })),
        )
    }
}

/// Apply a batch of change events atomically.
pub async fn post_events(
    State(state): State<AdminState>,
    Json(events): Json<Vec<ChangeEvent>>,
) -> (StatusCode, Json<Value>) {
    match state.dispatcher.apply_all(events) {
        Ok(applied) => (StatusCode::OK, Json(json!({ "applied": applied }))),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))),
    }
}
