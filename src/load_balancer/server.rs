//! Server runtime.
//!
//! # Responsibilities
//! - Represent a single backend server and its static metadata
//! - Hold the live circuit breaker status, shared by every runtime version of
//!   the same server
//! - Track in-flight requests dispatched to the server

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use axum::http::uri::Authority;
use url::Url;

use crate::config::validation::validate_policy;
use crate::config::ServerConfig;
use crate::observability::metrics;
use crate::proxy::error::SyncError;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitStatus};

/// Window every server is analysed over, breaker or not.
pub const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Live state of one backend server.
#[derive(Debug)]
pub struct ServerRuntime {
    config: ServerConfig,
    /// Pre-calculated base URL for performance.
    base_url: Url,
    /// Authority every forwarded request is sent to.
    authority: Authority,
    circuit_breaker: Option<CircuitBreaker>,
    /// Current breaker status (0=Open, 1=Half, 2=Close).
    status: Arc<AtomicU8>,
    /// Number of dispatch nodes currently holding this server.
    in_flight: AtomicUsize,
}

impl ServerRuntime {
    /// Create a new server runtime in the Open status.
    ///
    /// The breaker policy is checked the same way a configuration file is.
    pub fn new(config: ServerConfig) -> Result<Self, SyncError> {
        let invalid_address = || SyncError::InvalidAddress {
            server: config.id.clone(),
            addr: config.addr.clone(),
        };
        let base_url = Url::parse(&format!("http://{}", config.addr)).map_err(|_| invalid_address())?;
        let authority = Authority::try_from(config.addr.as_str()).map_err(|_| invalid_address())?;

        if let Some(cb) = &config.circuit_breaker {
            let mut errors = Vec::new();
            validate_policy(&config.id, cb, &mut errors);
            if let Some(error) = errors.into_iter().next() {
                return Err(SyncError::InvalidPolicy(error));
            }
        }
        let circuit_breaker = config.circuit_breaker.as_ref().map(CircuitBreaker::from);

        Ok(Self {
            config,
            base_url,
            authority,
            circuit_breaker,
            status: Arc::new(AtomicU8::new(CircuitStatus::Open as u8)),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Share the breaker status of a previous runtime of the same server.
    ///
    /// Transitions made through either runtime are seen by both, so requests
    /// still holding the old one keep driving the live breaker.
    pub fn sharing_status(mut self, previous: &ServerRuntime) -> Self {
        self.status = previous.status.clone();
        self
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.circuit_breaker.as_ref()
    }

    /// Analysis windows this server needs.
    pub fn analysis_spans(&self) -> Vec<Duration> {
        let mut spans = vec![RATE_WINDOW];
        if let Some(cb) = &self.circuit_breaker {
            spans.push(cb.open_to_close);
            spans.push(cb.half_to_open);
        }
        spans
    }

    // --- Circuit status ---

    pub fn status(&self) -> CircuitStatus {
        CircuitStatus::from(self.status.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Returns false if the status was no longer `from`.
    pub fn transition(&self, from: CircuitStatus, to: CircuitStatus) -> bool {
        let changed = self
            .status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if changed {
            self.report_transition(from, to);
        }
        changed
    }

    /// Force a status regardless of the current one.
    pub fn set_status(&self, to: CircuitStatus) {
        let from = CircuitStatus::from(self.status.swap(to as u8, Ordering::AcqRel));
        if from != to {
            self.report_transition(from, to);
        }
    }

    /// External recovery signal: Close becomes Half.
    pub fn promote_to_half(&self) -> bool {
        self.transition(CircuitStatus::Close, CircuitStatus::Half)
    }

    fn report_transition(&self, from: CircuitStatus, to: CircuitStatus) {
        if to == CircuitStatus::Close {
            tracing::warn!(server = %self.id(), from = %from, to = %to, "Circuit status changed");
        } else {
            tracing::info!(server = %self.id(), from = %from, to = %to, "Circuit status changed");
        }
        metrics::record_circuit_transition(self.id(), from, to);
    }

    // --- In-flight tracking ---

    /// Number of dispatch nodes currently holding this server.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Count one in-flight request until the returned guard drops.
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            server: self.clone(),
        }
    }
}

/// A RAII guard that releases an in-flight slot on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    server: Arc<ServerRuntime>,
}

impl InFlightGuard {
    pub fn server(&self) -> &Arc<ServerRuntime> {
        &self.server
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.server.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
