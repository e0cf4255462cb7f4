//! The dispatch table.
//!
//! # Responsibilities
//! - Hold APIs, routing overrides, clusters, servers and bindings
//! - Resolve a request to dispatch nodes (API, cluster, server)
//! - Apply configuration-sync events atomically
//!
//! # Concurrency
//! Readers load one immutable [`RouteTable`] snapshot and run the whole
//! match → route → select sequence against it without locking. Writers
//! serialize on a mutex, mutate a clone through [`TableWriter`] and publish the
//! clone only when every step succeeded.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;

use crate::analysis::Analysis;
use crate::config::{
    ApiConfig, BindConfig, ClusterConfig, GatewayConfig, RoutingConfig, ServerConfig,
};
use crate::load_balancer::{ClusterRuntime, ServerRuntime};
use crate::observability::metrics;
use crate::proxy::error::SyncError;
use crate::proxy::event::ChangeEvent;
use crate::proxy::node::DispatchNode;
use crate::routing::{Api, Routing};

/// One immutable version of the routing table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    /// Sorted by precedence.
    apis: Vec<Arc<Api>>,
    /// Sorted by precedence.
    routings: Vec<Arc<Routing>>,
    clusters: HashMap<String, Arc<ClusterRuntime>>,
    servers: HashMap<String, Arc<ServerRuntime>>,
    binds: HashSet<BindConfig>,
    /// server id → cluster ids. Every registered server has an entry.
    mapping: HashMap<String, BTreeSet<String>>,
    next_seq: u64,
}

impl RouteTable {
    pub fn apis(&self) -> &[Arc<Api>] {
        &self.apis
    }

    pub fn routings(&self) -> &[Arc<Routing>] {
        &self.routings
    }

    pub fn api(&self, name: &str) -> Option<&Arc<Api>> {
        self.apis.iter().find(|a| a.name() == name)
    }

    pub fn cluster(&self, id: &str) -> Option<&Arc<ClusterRuntime>> {
        self.clusters.get(id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Arc<ClusterRuntime>> {
        self.clusters.values()
    }

    pub fn server(&self, id: &str) -> Option<&Arc<ServerRuntime>> {
        self.servers.get(id)
    }

    pub fn servers(&self) -> impl Iterator<Item = &Arc<ServerRuntime>> {
        self.servers.values()
    }

    pub fn binds(&self) -> &HashSet<BindConfig> {
        &self.binds
    }

    /// Clusters the server is bound to.
    pub fn clusters_of(&self, server_id: &str) -> Option<&BTreeSet<String>> {
        self.mapping.get(server_id)
    }

    /// First API, in precedence order, whose predicate matches.
    pub fn match_api(&self, req: &Request<Body>) -> Option<&Arc<Api>> {
        self.apis.iter().find(|api| api.matches(req))
    }

    /// Cluster for a node: the first matching override, else `default`.
    pub fn select_cluster_by_routing<'a>(
        &'a self,
        req: &Request<Body>,
        api: &str,
        default: &'a str,
    ) -> &'a str {
        match self.routings.iter().find(|r| r.matches(req, api)) {
            Some(routing) => {
                tracing::trace!(routing = %routing.name(), cluster = %routing.cluster(), "Routing override applied");
                routing.cluster()
            }
            None => default,
        }
    }

    /// Server chosen by the cluster's strategy.
    pub fn select_server(&self, req: &Request<Body>, cluster: &str) -> Option<Arc<ServerRuntime>> {
        let Some(runtime) = self.clusters.get(cluster) else {
            tracing::debug!(cluster = %cluster, "Cluster not found");
            return None;
        };
        let id = runtime.select_server(req)?;
        let server = self.servers.get(id).cloned();
        if server.is_none() {
            tracing::debug!(cluster = %cluster, server = %id, "Member server not registered");
        }
        server
    }

    /// Resolve `req` into one node per destination of the matching API.
    /// Empty when no API matches.
    pub fn dispatch(&self, req: &Request<Body>) -> Vec<DispatchNode> {
        let Some(api) = self.match_api(req) else {
            return Vec::new();
        };

        api.nodes()
            .iter()
            .map(|node| {
                let cluster = self.select_cluster_by_routing(req, api.name(), node.cluster());
                let dest = self.select_server(req, cluster);
                DispatchNode::new(api.clone(), node.clone(), cluster.to_string(), dest)
            })
            .collect()
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Mutates a draft table. Only reachable while holding the writer lock.
pub struct TableWriter<'a> {
    table: &'a mut RouteTable,
    analysis: &'a Analysis,
    added: Vec<String>,
    removed: Vec<String>,
}

impl<'a> TableWriter<'a> {
    fn new(table: &'a mut RouteTable, analysis: &'a Analysis) -> Self {
        Self {
            table,
            analysis,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Read access to the draft.
    pub fn table(&self) -> &RouteTable {
        self.table
    }

    pub fn apply(&mut self, event: ChangeEvent) -> Result<(), SyncError> {
        match event {
            ChangeEvent::PutServer(config) => self.add_server(config),
            ChangeEvent::DeleteServer { id } => self.remove_server(&id),
            ChangeEvent::PutCluster(config) => {
                self.add_cluster(&config);
                Ok(())
            }
            ChangeEvent::DeleteCluster { id } => self.remove_cluster(&id),
            ChangeEvent::PutBind(bind) => self.bind(&bind.server, &bind.cluster),
            ChangeEvent::DeleteBind(bind) => {
                self.unbind(&bind.server, &bind.cluster);
                Ok(())
            }
            ChangeEvent::PutApi(config) => self.add_api(config),
            ChangeEvent::DeleteApi { name } => self.remove_api(&name),
            ChangeEvent::PutRouting(config) => self.add_routing(config),
            ChangeEvent::DeleteRouting { name } => self.remove_routing(&name),
        }
    }

    // --- Servers ---

    /// Register or update a server. An unchanged config is a no-op; a changed
    /// one replaces the runtime and shares its breaker status.
    pub fn add_server(&mut self, config: ServerConfig) -> Result<(), SyncError> {
        let previous = self.table.servers.get(&config.id);
        if previous.is_some_and(|s| *s.config() == config) {
            return Ok(());
        }

        let mut runtime = ServerRuntime::new(config)?;
        if let Some(previous) = previous {
            runtime = runtime.sharing_status(previous);
        }
        self.add_analysis(&runtime);

        let id = runtime.id().to_string();
        self.table.mapping.entry(id.clone()).or_default();
        self.table.servers.insert(id.clone(), Arc::new(runtime));
        self.added.push(id);
        Ok(())
    }

    /// Remove a server and every binding it has.
    pub fn remove_server(&mut self, id: &str) -> Result<(), SyncError> {
        if !self.table.servers.contains_key(id) {
            return Err(SyncError::UnknownServer(id.to_string()));
        }

        let clusters: Vec<String> = self
            .table
            .mapping
            .get(id)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default();
        for cluster in clusters {
            self.unbind(id, &cluster);
        }

        self.table.mapping.remove(id);
        self.table.servers.remove(id);
        self.removed.push(id.to_string());
        Ok(())
    }

    /// Register the analysis windows the server needs. Idempotent.
    pub fn add_analysis(&self, server: &ServerRuntime) {
        for span in server.analysis_spans() {
            self.analysis.add_recent_count(server.id(), span);
        }
    }

    // --- Clusters ---

    /// Register a cluster, or switch the strategy of an existing one.
    pub fn add_cluster(&mut self, config: &ClusterConfig) {
        match self.table.clusters.get_mut(&config.id) {
            Some(cluster) => Arc::make_mut(cluster).set_load_balance(config.load_balance),
            None => {
                self.table
                    .clusters
                    .insert(config.id.clone(), Arc::new(ClusterRuntime::new(config)));
            }
        }
    }

    /// Remove a cluster and unbind its members.
    pub fn remove_cluster(&mut self, id: &str) -> Result<(), SyncError> {
        let Some(cluster) = self.table.clusters.get(id) else {
            return Err(SyncError::UnknownCluster(id.to_string()));
        };

        let members = cluster.members().to_vec();
        for server in members {
            self.unbind(&server, id);
        }
        self.table.clusters.remove(id);
        Ok(())
    }

    // --- Bindings ---

    /// Make `server` a member of `cluster`. Binding twice is a no-op.
    pub fn bind(&mut self, server: &str, cluster: &str) -> Result<(), SyncError> {
        if !self.table.servers.contains_key(server) {
            return Err(SyncError::UnknownServer(server.to_string()));
        }
        let Some(runtime) = self.table.clusters.get_mut(cluster) else {
            return Err(SyncError::UnknownCluster(cluster.to_string()));
        };

        if !self.table.binds.insert(BindConfig {
            server: server.to_string(),
            cluster: cluster.to_string(),
        }) {
            return Ok(());
        }
        Arc::make_mut(runtime).add(server);
        self.table
            .mapping
            .entry(server.to_string())
            .or_default()
            .insert(cluster.to_string());
        Ok(())
    }

    /// Remove a binding. Returns false if it did not exist.
    ///
    /// For callers already holding the writer lock; see [`Dispatcher::unbind`].
    pub fn unbind(&mut self, server: &str, cluster: &str) -> bool {
        let bind = BindConfig {
            server: server.to_string(),
            cluster: cluster.to_string(),
        };
        if !self.table.binds.remove(&bind) {
            return false;
        }

        if let Some(runtime) = self.table.clusters.get_mut(cluster) {
            Arc::make_mut(runtime).remove(server);
        }
        if let Some(clusters) = self.table.mapping.get_mut(server) {
            clusters.remove(cluster);
        }
        true
    }

    // --- APIs ---

    /// Register or replace an API. A replaced API keeps its registration order.
    pub fn add_api(&mut self, config: ApiConfig) -> Result<(), SyncError> {
        let existing = self.table.apis.iter().position(|a| a.name() == config.name);
        if let Some(idx) = existing {
            if *self.table.apis[idx].config() == config {
                return Ok(());
            }
        }

        let seq = match existing {
            Some(idx) => self.table.apis[idx].seq(),
            None => self.table.take_seq(),
        };
        let api = Arc::new(Api::new(config, seq)?);
        match existing {
            Some(idx) => self.table.apis[idx] = api,
            None => self.table.apis.push(api),
        }
        self.table.apis.sort_by_key(|a| a.precedence());
        Ok(())
    }

    pub fn remove_api(&mut self, name: &str) -> Result<(), SyncError> {
        let before = self.table.apis.len();
        self.table.apis.retain(|a| a.name() != name);
        if self.table.apis.len() == before {
            return Err(SyncError::UnknownApi(name.to_string()));
        }
        Ok(())
    }

    // --- Routing overrides ---

    /// Register or replace an override. A replaced one keeps its registration order.
    pub fn add_routing(&mut self, config: RoutingConfig) -> Result<(), SyncError> {
        let existing = self.table.routings.iter().position(|r| r.name() == config.name);
        if let Some(idx) = existing {
            if *self.table.routings[idx].config() == config {
                return Ok(());
            }
        }

        let seq = match existing {
            Some(idx) => self.table.routings[idx].seq(),
            None => self.table.take_seq(),
        };
        let routing = Arc::new(Routing::new(config, seq)?);
        match existing {
            Some(idx) => self.table.routings[idx] = routing,
            None => self.table.routings.push(routing),
        }
        self.table.routings.sort_by_key(|r| r.precedence());
        Ok(())
    }

    pub fn remove_routing(&mut self, name: &str) -> Result<(), SyncError> {
        let before = self.table.routings.len();
        self.table.routings.retain(|r| r.name() != name);
        if self.table.routings.len() == before {
            return Err(SyncError::UnknownRouting(name.to_string()));
        }
        Ok(())
    }
}

/// Shared dispatch table.
#[derive(Debug)]
pub struct Dispatcher {
    table: ArcSwap<RouteTable>,
    writer: Mutex<()>,
    analysis: Arc<Analysis>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            writer: Mutex::new(()),
            analysis: Arc::new(Analysis::new()),
        }
    }

    /// Create a dispatcher populated from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, SyncError> {
        let dispatcher = Self::new();
        dispatcher.reload(config)?;
        Ok(dispatcher)
    }

    pub fn analysis(&self) -> &Arc<Analysis> {
        &self.analysis
    }

    /// The current table version.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    pub fn server(&self, id: &str) -> Option<Arc<ServerRuntime>> {
        self.table.load().server(id).cloned()
    }

    /// Resolve a request against the current table version.
    pub fn dispatch(&self, req: &Request<Body>) -> Vec<DispatchNode> {
        self.table.load().dispatch(req)
    }

    /// Run `f` as one transaction: its changes are published only if it
    /// returns `Ok`.
    pub fn update<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce(&mut TableWriter<'_>) -> Result<T, SyncError>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.table.load_full();
        let mut draft = RouteTable::clone(&current);
        let mut writer = TableWriter::new(&mut draft, &self.analysis);
        let result = f(&mut writer);
        let added = std::mem::take(&mut writer.added);
        let removed = std::mem::take(&mut writer.removed);

        match result {
            Ok(value) => {
                let published = Arc::new(draft);
                self.table.store(published.clone());
                for id in removed.iter().filter(|id| published.server(id).is_none()) {
                    self.analysis.remove(id);
                }
                Ok(value)
            }
            Err(e) => {
                for id in added.iter().filter(|id| current.server(id).is_none()) {
                    self.analysis.remove(id);
                }
                Err(e)
            }
        }
    }

    /// Apply one event atomically.
    pub fn apply(&self, event: ChangeEvent) -> Result<(), SyncError> {
        let kind = event.kind();
        let result = self.update(|w| w.apply(event));
        metrics::record_table_update(kind, result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(event = kind, error = %e, "Change event rejected");
        }
        result
    }

    /// Apply a batch as one transaction. Returns the number of events applied.
    pub fn apply_all(&self, events: Vec<ChangeEvent>) -> Result<usize, SyncError> {
        let count = events.len();
        let result = self.update(|w| events.into_iter().try_for_each(|e| w.apply(e)));
        metrics::record_table_update("batch", result.is_ok());
        match result {
            Ok(()) => {
                tracing::info!(events = count, "Change batch applied");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(events = count, error = %e, "Change batch rejected");
                Err(e)
            }
        }
    }

    /// Bring the table in line with `config` in one transaction.
    ///
    /// Unchanged servers keep their runtime, so breaker status and analysis
    /// counters survive a reload.
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), SyncError> {
        let result = self.update(|w| {
            let stale_routings: Vec<String> = w
                .table()
                .routings()
                .iter()
                .filter(|r| !config.routings.iter().any(|c| c.name == r.name()))
                .map(|r| r.name().to_string())
                .collect();
            for name in stale_routings {
                w.remove_routing(&name)?;
            }

            let stale_apis: Vec<String> = w
                .table()
                .apis()
                .iter()
                .filter(|a| !config.apis.iter().any(|c| c.name == a.name()))
                .map(|a| a.name().to_string())
                .collect();
            for name in stale_apis {
                w.remove_api(&name)?;
            }

            let stale_binds: Vec<BindConfig> = w
                .table()
                .binds()
                .iter()
                .filter(|b| !config.binds.contains(b))
                .cloned()
                .collect();
            for bind in stale_binds {
                w.unbind(&bind.server, &bind.cluster);
            }

            let stale_clusters: Vec<String> = w
                .table()
                .clusters()
                .filter(|c| !config.clusters.iter().any(|cc| cc.id == c.id()))
                .map(|c| c.id().to_string())
                .collect();
            for id in stale_clusters {
                w.remove_cluster(&id)?;
            }

            let stale_servers: Vec<String> = w
                .table()
                .servers()
                .filter(|s| !config.servers.iter().any(|sc| sc.id == s.id()))
                .map(|s| s.id().to_string())
                .collect();
            for id in stale_servers {
                w.remove_server(&id)?;
            }

            for server in &config.servers {
                w.add_server(server.clone())?;
            }
            for cluster in &config.clusters {
                w.add_cluster(cluster);
            }
            for bind in &config.binds {
                w.bind(&bind.server, &bind.cluster)?;
            }
            for api in &config.apis {
                w.add_api(api.clone())?;
            }
            for routing in &config.routings {
                w.add_routing(routing.clone())?;
            }
            Ok(())
        });

        metrics::record_table_update("reload", result.is_ok());
        match &result {
            Ok(()) => tracing::info!(
                servers = config.servers.len(),
                clusters = config.clusters.len(),
                apis = config.apis.len(),
                routings = config.routings.len(),
                "Routing table reloaded"
            ),
            Err(e) => tracing::error!(error = %e, "Routing table reload rejected"),
        }
        result
    }

    pub fn bind(&self, server: &str, cluster: &str) -> Result<(), SyncError> {
        self.update(|w| w.bind(server, cluster))
    }

    /// Remove a binding, taking the writer lock. Returns false if it did not
    /// exist.
    pub fn unbind(&self, server: &str, cluster: &str) -> bool {
        self.update(|w| Ok(w.unbind(server, cluster))).unwrap_or(false)
    }
}
