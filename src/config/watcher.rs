//! Configuration file watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify event in the config file's directory
//!     → keep only events naming the config file (editors often save by rename)
//!     → skip content identical to the last accepted load
//!     → parse + validate → update channel
//!     → apply_updates: Dispatcher::reload, one transaction per config
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::GatewayConfig;
use crate::proxy::Dispatcher;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching the file's directory in a background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        // The content already served counts as accepted
        let mut last = fs::read_to_string(&path).ok();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if touches(&event, &path) => {
                    if let Some(config) = reload_if_changed(&path, &mut last) {
                        let _ = tx.send(config);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// True if `event` wrote or replaced the file at `path`.
fn touches(event: &Event, path: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == path.file_name())
}

/// Load `path` unless its content equals `last`. A config that fails to
/// parse or validate is not remembered, so fixing the file reloads it.
fn reload_if_changed(path: &Path, last: &mut Option<String>) -> Option<GatewayConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Config file unreadable, keeping current routing table");
            return None;
        }
    };
    if last.as_deref() == Some(content.as_str()) {
        tracing::debug!(path = ?path, "Config file content unchanged");
        return None;
    }

    match parse_config(&content) {
        Ok(config) => {
            tracing::info!(path = ?path, "Config file change detected, reloading");
            *last = Some(content);
            Some(config)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current routing table");
            None
        }
    }
}

/// Reload results seen by [`apply_updates`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReloadStats {
    pub applied: usize,
    pub rejected: usize,
}

/// Reload `dispatcher` with every configuration received until the channel
/// closes.
pub async fn apply_updates(
    dispatcher: Arc<Dispatcher>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
) -> ReloadStats {
    let mut stats = ReloadStats::default();
    while let Some(config) = updates.recv().await {
        let before = server_ids(&dispatcher);
        match dispatcher.reload(&config) {
            Ok(()) => {
                stats.applied += 1;
                let after = server_ids(&dispatcher);
                tracing::info!(
                    reload = stats.applied,
                    added = ?after.difference(&before).collect::<Vec<_>>(),
                    removed = ?before.difference(&after).collect::<Vec<_>>(),
                    "Configuration reload applied"
                );
            }
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(
                    rejected = stats.rejected,
                    error = %e,
                    "Configuration reload rejected, previous table stays live"
                );
            }
        }
    }
    stats
}

fn server_ids(dispatcher: &Dispatcher) -> BTreeSet<String> {
    dispatcher
        .snapshot()
        .servers()
        .map(|s| s.id().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind};
    use crate::config::schema::{BindConfig, ClusterConfig, ServerConfig};

    const ONE_SERVER: &str = r#"
        [[servers]]
        id = "s1"
        addr = "127.0.0.1:9001"
    "#;

    fn temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    fn server(id: &str) -> ServerConfig {
        ServerConfig {
            id: id.into(),
            addr: "127.0.0.1:9001".into(),
            circuit_breaker: None,
            health_check_path: None,
        }
    }

    #[test]
    fn test_touches_only_config_file() {
        let path = Path::new("/etc/gateway/gateway.toml");
        let modified = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/etc/gateway/gateway.toml"));
        let sibling = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/etc/gateway/other.toml"));
        let renamed_in = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/etc/gateway/gateway.toml"));

        assert!(touches(&modified, path));
        assert!(!touches(&sibling, path));
        assert!(touches(&renamed_in, path));
    }

    #[test]
    fn test_unchanged_content_skipped() {
        let path = temp_config("watcher-unchanged", ONE_SERVER);
        let mut last = None;

        assert!(reload_if_changed(&path, &mut last).is_some());
        assert!(reload_if_changed(&path, &mut last).is_none());

        fs::write(&path, format!("{ONE_SERVER}\n[[clusters]]\nid = \"c1\"\n")).unwrap();
        let config = reload_if_changed(&path, &mut last).unwrap();
        assert_eq!(config.clusters.len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_content_not_remembered() {
        let path = temp_config("watcher-invalid", "servers = 3");
        let mut last = None;

        assert!(reload_if_changed(&path, &mut last).is_none());
        assert!(last.is_none());

        fs::write(&path, ONE_SERVER).unwrap();
        assert!(reload_if_changed(&path, &mut last).is_some());
        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_apply_updates_counts_outcomes() {
        let initial = GatewayConfig {
            servers: vec![server("s1"), server("s2")],
            ..Default::default()
        };
        let dispatcher = Arc::new(Dispatcher::from_config(&initial).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(GatewayConfig {
            servers: vec![server("s1")],
            ..Default::default()
        })
        .unwrap();
        tx.send(GatewayConfig {
            servers: vec![server("s1")],
            clusters: vec![ClusterConfig {
                id: "c1".into(),
                load_balance: Default::default(),
            }],
            binds: vec![BindConfig {
                server: "ghost".into(),
                cluster: "c1".into(),
            }],
            ..Default::default()
        })
        .unwrap();
        drop(tx);

        let stats = apply_updates(dispatcher.clone(), rx).await;
        assert_eq!(stats, ReloadStats { applied: 1, rejected: 1 });
        assert!(dispatcher.server("s2").is_none());
        assert!(dispatcher.snapshot().cluster("c1").is_none());
    }
}
