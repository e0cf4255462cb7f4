//! Background task runner.
//!
//! Every task races the shutdown signal, so triggering [`Shutdown`] stops all
//! of them at their next await point.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{AbortHandle, JoinHandle};

use crate::lifecycle::Shutdown;

#[derive(Debug, Clone)]
pub struct TaskRunner {
    shutdown: Shutdown,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskRunner {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Spawn `task` on the runtime until it finishes or shutdown fires.
    pub fn spawn<F>(&self, name: &'static str, task: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            tracing::debug!(task = name, "Task started");
            tokio::select! {
                _ = task => tracing::debug!(task = name, "Task finished"),
                _ = shutdown.recv() => tracing::debug!(task = name, "Task stopped by shutdown"),
            }
        });
        let abort = handle.abort_handle();

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        abort
    }

    /// Number of tasks that have not finished yet.
    pub fn running(&self) -> usize {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every spawned task to end.
    pub async fn join(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Background task panicked");
                }
            }
        }
    }
}
