//! Filter context for one backend call.

use crate::analysis::Analysis;
use crate::load_balancer::ServerRuntime;
use crate::proxy::filter::FilterContext;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitStatus};

/// Binds a destination server to the shared analysis for the filter chain.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    server: &'a ServerRuntime,
    analysis: &'a Analysis,
}

impl<'a> RequestContext<'a> {
    pub fn new(server: &'a ServerRuntime, analysis: &'a Analysis) -> Self {
        Self { server, analysis }
    }

    pub fn server(&self) -> &'a ServerRuntime {
        self.server
    }
}

impl FilterContext for RequestContext<'_> {
    fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.server.circuit_breaker()
    }

    fn circuit_status(&self) -> CircuitStatus {
        self.server.status()
    }

    fn change_circuit_status(&self, from: CircuitStatus, to: CircuitStatus) -> bool {
        self.server.transition(from, to)
    }

    fn analysis(&self) -> &Analysis {
        self.analysis
    }

    fn server_key(&self) -> &str {
        self.server.id()
    }
}
