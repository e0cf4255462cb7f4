//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe servers whose breaker is Close
//! - Promote a server to Half when its probe succeeds

use std::sync::Arc;
use std::time::Duration;
use axum::body::Body;
use axum::http::Request;
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::lifecycle::{Scheduler, Timeout};
use crate::load_balancer::ServerRuntime;
use crate::observability::metrics;
use crate::proxy::Dispatcher;
use crate::resilience::CircuitStatus;

pub struct HealthChecker {
    dispatcher: Arc<Dispatcher>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthChecker {
    pub fn new(dispatcher: Arc<Dispatcher>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            dispatcher,
            config,
            client,
        }
    }

    /// Schedule periodic checks. `None` when checks are disabled.
    pub fn start(self: Arc<Self>, scheduler: &Scheduler) -> Option<Timeout> {
        if !self.config.enabled || self.config.interval_secs == 0 {
            tracing::info!("Active health checks disabled");
            return None;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health checker starting"
        );

        let period = Duration::from_secs(self.config.interval_secs);
        Some(scheduler.schedule_periodic("health-check", period, move || {
            let checker = self.clone();
            async move {
                checker.check_all().await;
            }
        }))
    }

    /// Probe every Close server once. Returns how many were promoted.
    pub async fn check_all(&self) -> usize {
        let table = self.dispatcher.snapshot();
        let closed: Vec<Arc<ServerRuntime>> = table
            .servers()
            .filter(|s| s.status() == CircuitStatus::Close)
            .cloned()
            .collect();

        let results = join_all(closed.iter().map(|server| async move {
            let healthy = self.probe(server).await;
            metrics::record_health_probe(server.id(), healthy);
            apply_probe_result(server, healthy)
        }))
        .await;

        results.into_iter().filter(|promoted| *promoted).count()
    }

    /// URL probed for `server`.
    pub fn probe_uri(&self, server: &ServerRuntime) -> String {
        let path = server
            .config()
            .health_check_path
            .as_deref()
            .unwrap_or(&self.config.path);
        match server.base_url().join(path) {
            Ok(url) => url.into(),
            Err(_) => format!("http://{}{}", server.addr(), path),
        }
    }

    async fn probe(&self, server: &ServerRuntime) -> bool {
        let request = match Request::builder()
            .method("GET")
            .uri(self.probe_uri(server))
            .header("user-agent", "api-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(server = %server.id(), error = %e, "Failed to build health check request");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(server = %server.id(), status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(server = %server.id(), error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(server = %server.id(), "Health check failed: timeout");
                false
            }
        }
    }
}

/// Apply one probe outcome. Returns true if the server moved Close → Half.
pub fn apply_probe_result(server: &ServerRuntime, healthy: bool) -> bool {
    healthy && server.promote_to_half()
}
