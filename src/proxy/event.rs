//! Configuration-sync events.
//!
//! Each event is applied atomically under the table writer lock; a batch is
//! applied as one transaction.

use serde::{Deserialize, Serialize};

use crate::config::{ApiConfig, BindConfig, ClusterConfig, RoutingConfig, ServerConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    PutServer(ServerConfig),
    DeleteServer { id: String },
    PutCluster(ClusterConfig),
    DeleteCluster { id: String },
    PutBind(BindConfig),
    DeleteBind(BindConfig),
    PutApi(ApiConfig),
    DeleteApi { name: String },
    PutRouting(RoutingConfig),
    DeleteRouting { name: String },
}

impl ChangeEvent {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::PutServer(_) => "put_server",
            ChangeEvent::DeleteServer { .. } => "delete_server",
            ChangeEvent::PutCluster(_) => "put_cluster",
            ChangeEvent::DeleteCluster { .. } => "delete_cluster",
            ChangeEvent::PutBind(_) => "put_bind",
            ChangeEvent::DeleteBind(_) => "delete_bind",
            ChangeEvent::PutApi(_) => "put_api",
            ChangeEvent::DeleteApi { .. } => "delete_api",
            ChangeEvent::PutRouting(_) => "put_routing",
            ChangeEvent::DeleteRouting { .. } => "delete_routing",
        }
    }
}
