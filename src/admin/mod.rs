//! Admin API.
//!
//! Read-only views of the routing table and breakers, manual Close → Half
//! recovery and atomic application of change-event batches. Every route
//! requires the configured bearer token.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::proxy::Dispatcher;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub dispatcher: Arc<Dispatcher>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(dispatcher: Arc<Dispatcher>, api_key: String) -> Router {
    let state = AdminState {
        dispatcher,
        api_key: api_key.into(),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/servers", get(get_servers))
        .route("/admin/servers/{id}/half", post(promote_server))
        .route("/admin/clusters", get(get_clusters))
        .route("/admin/apis", get(get_apis))
        .route("/admin/events", post(post_events))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
