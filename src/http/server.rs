//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener, shut down gracefully
//! - Dispatch requests through the routing table
//! - Gate each backend call with the filter chain
//! - Forward requests to backend servers
//! - Start background work (health checks, config reloads, admin API)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{request::Parts, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::watcher::apply_updates;
use crate::config::GatewayConfig;
use crate::health::HealthChecker;
use crate::http::request::{backend_request, request_id};
use crate::http::response::from_backend;
use crate::lifecycle::{Scheduler, Shutdown, TaskRunner};
use crate::observability::metrics;
use crate::proxy::filter::default_chain;
use crate::proxy::{DispatchNode, Dispatcher, FilterChain, GatewayError, RequestContext, SyncError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub filters: Arc<FilterChain>,
    pub client: Client<HttpConnector, Body>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, config: &GatewayConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            dispatcher,
            filters: Arc::new(default_chain()),
            client,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_body_bytes: config.listener.max_body_bytes,
        }
    }
}

/// The gateway's HTTP front end.
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
    shutdown: Shutdown,
}

impl GatewayServer {
    /// Build the routing table from `config`.
    pub fn new(config: GatewayConfig) -> Result<Self, SyncError> {
        let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    /// Serve an existing dispatcher.
    pub fn with_dispatcher(config: GatewayConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let state = AppState::new(dispatcher, &config);
        Self {
            config,
            state,
            shutdown: Shutdown::new(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.state.dispatcher
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Triggering this stops the server and its background tasks.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Run until shutdown is triggered.
    ///
    /// Configurations received on `config_updates` are applied with
    /// [`Dispatcher::reload`].
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: Option<mpsc::UnboundedReceiver<GatewayConfig>>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, filters = ?self.state.filters.names(), "Gateway server starting");

        let runner = TaskRunner::new(self.shutdown.clone());
        let scheduler = Scheduler::new(runner.clone());

        let checker = Arc::new(HealthChecker::new(
            self.state.dispatcher.clone(),
            self.config.health_check.clone(),
        ));
        let _health = checker.start(&scheduler);

        if let Some(updates) = config_updates {
            let dispatcher = self.state.dispatcher.clone();
            runner.spawn("config-reload", async move {
                let stats = apply_updates(dispatcher, updates).await;
                tracing::debug!(applied = stats.applied, rejected = stats.rejected, "Config update channel closed");
            });
        }

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
            let app = admin::setup_admin_router(
                self.state.dispatcher.clone(),
                self.config.admin.api_key.clone(),
            );
            runner.spawn("admin-api", async move {
                if let Err(e) = axum::serve(admin_listener, app).await {
                    tracing::error!(error = %e, "Admin API stopped");
                }
            });
        }

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = self.shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        self.shutdown.trigger();
        runner.join().await;
        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

/// Build the gateway router around `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/{*path}", any(gateway_handler))
        .route("/", any(gateway_handler))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Main gateway handler.
/// Dispatches the request, forwards every node and answers with the first.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let request_id = request_id(request.headers()).to_string();

    let nodes = state.dispatcher.dispatch(&request);
    let Some(api) = nodes.first().map(|n| n.api().clone()) else {
        tracing::debug!(request_id = %request_id, path = %request.uri().path(), "No API matched");
        metrics::record_no_route("no_api");
        metrics::record_request(&method, 404, "none", start_time);
        return GatewayError::NoRoute.into_response();
    };

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = GatewayError::InvalidRequest(e.to_string());
            metrics::record_request(&method, error.status().as_u16(), api.name(), start_time);
            return error.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        api = %api.name(),
        nodes = nodes.len(),
        "Dispatching request"
    );

    let mut nodes = join_all(
        nodes
            .into_iter()
            .map(|node| forward(&state, &parts, body.clone(), client_ip, &request_id, node)),
    )
    .await;

    // Merged APIs answer with their first node; the others only feed analysis
    let response = match nodes.first_mut().map(DispatchNode::take_outcome) {
        Some(Ok(response)) => response,
        Some(Err(e)) => e.into_response(),
        None => GatewayError::NoRoute.into_response(),
    };

    metrics::record_request(&method, response.status().as_u16(), api.name(), start_time);
    response
}

/// Run one dispatch node through the filter chain and the backend.
async fn forward(
    state: &AppState,
    parts: &Parts,
    body: axum::body::Bytes,
    client_ip: Option<std::net::IpAddr>,
    request_id: &str,
    mut node: DispatchNode,
) -> DispatchNode {
    let Some(server) = node.dest().cloned() else {
        tracing::warn!(request_id = %request_id, api = %node.api().name(), cluster = %node.cluster(), "No server available");
        metrics::record_no_route("no_server");
        let error = GatewayError::NoServer(node.cluster().to_string());
        node.fail(error);
        return node;
    };

    let ctx = RequestContext::new(&server, state.dispatcher.analysis());
    if let Err(e) = state.filters.pre(&ctx) {
        if e.is_circuit_rejection() {
            metrics::record_circuit_rejection(server.id(), e.signal());
        }
        node.fail(e);
        return node;
    }

    let path_and_query = node.node().path_and_query(&parts.uri);
    let request = match backend_request(parts, body, &server, &path_and_query, client_ip) {
        Ok(req) => req,
        Err(e) => {
            node.fail(e);
            return node;
        }
    };

    match time::timeout(state.request_timeout, state.client.request(request)).await {
        Ok(Ok(response)) => {
            let status = response.status();
            if status.is_server_error() {
                tracing::warn!(request_id = %request_id, server = %server.id(), status = %status, "Backend returned server error");
                state.filters.post_err(&ctx);
            } else if let Err(e) = state.filters.post(&ctx) {
                tracing::warn!(request_id = %request_id, server = %server.id(), error = %e, "Post filter failed");
            }
            node.set_response(from_backend(response.map(Body::new)));
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, server = %server.id(), error = %e, "Backend error");
            state.filters.post_err(&ctx);
            node.fail(GatewayError::Backend(e.to_string()));
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, server = %server.id(), timeout = ?state.request_timeout, "Backend timeout");
            state.filters.post_err(&ctx);
            node.fail(GatewayError::BackendTimeout);
        }
    }
    node
}
