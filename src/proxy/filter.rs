//! Request lifecycle hooks.
//!
//! A [`Filter`] sees every dispatched backend call three times: before
//! forwarding (`pre`), after a successful call (`post`) and after a failed one
//! (`post_err`). Filters only talk to the request through [`FilterContext`].

use crate::analysis::{Analysis, Outcome};
use crate::proxy::error::GatewayError;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerFilter, CircuitStatus};

/// What a filter may ask of the request being processed.
pub trait FilterContext {
    /// Breaker policy of the destination server. `None` disables breaking.
    fn circuit_breaker(&self) -> Option<&CircuitBreaker>;

    /// Current breaker status of the destination server.
    fn circuit_status(&self) -> CircuitStatus;

    /// Move the breaker from `from` to `to`. Returns false if the status was
    /// no longer `from`.
    fn change_circuit_status(&self, from: CircuitStatus, to: CircuitStatus) -> bool;

    fn analysis(&self) -> &Analysis;

    /// Key of the destination server in the analysis.
    fn server_key(&self) -> &str;

    fn is_circuit_open(&self) -> bool {
        self.circuit_status() == CircuitStatus::Open
    }

    fn is_circuit_half(&self) -> bool {
        self.circuit_status() == CircuitStatus::Half
    }
}

/// A request lifecycle hook.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Gate before forwarding. An error rejects the call.
    fn pre(&self, _ctx: &dyn FilterContext) -> Result<(), GatewayError> {
        Ok(())
    }

    /// After a successful backend call.
    fn post(&self, _ctx: &dyn FilterContext) -> Result<(), GatewayError> {
        Ok(())
    }

    /// After a failed backend call.
    fn post_err(&self, _ctx: &dyn FilterContext) {}
}

/// Ordered filters applied to every backend call.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run `pre` in order, stopping at the first rejection.
    pub fn pre(&self, ctx: &dyn FilterContext) -> Result<(), GatewayError> {
        for filter in &self.filters {
            if let Err(e) = filter.pre(ctx) {
                tracing::debug!(filter = filter.name(), server = %ctx.server_key(), error = %e, "Filter rejected request");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run `post` in order, stopping at the first error.
    pub fn post(&self, ctx: &dyn FilterContext) -> Result<(), GatewayError> {
        for filter in &self.filters {
            filter.post(ctx)?;
        }
        Ok(())
    }

    /// Run `post_err` on every filter.
    pub fn post_err(&self, ctx: &dyn FilterContext) {
        for filter in &self.filters {
            filter.post_err(ctx);
        }
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain").field("filters", &self.names()).finish()
    }
}

/// Records every backend call outcome in the analysis.
///
/// Must run ahead of the breaker so the breaker's rates include the call that
/// just finished.
#[derive(Debug, Default)]
pub struct AnalysisFilter;

impl AnalysisFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for AnalysisFilter {
    fn name(&self) -> &'static str {
        "analysis"
    }

    fn post(&self, ctx: &dyn FilterContext) -> Result<(), GatewayError> {
        ctx.analysis().record(ctx.server_key(), Outcome::Success);
        Ok(())
    }

    fn post_err(&self, ctx: &dyn FilterContext) {
        ctx.analysis().record(ctx.server_key(), Outcome::Failure);
    }
}

/// The default chain: analysis first, then the circuit breaker.
pub fn default_chain() -> FilterChain {
    FilterChain::new(vec![
        Box::new(AnalysisFilter::new()),
        Box::new(CircuitBreakerFilter::new()),
    ])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use super::*;
    use crate::config::{CircuitBreakerConfig, ServerConfig};
    use crate::load_balancer::ServerRuntime;
    use crate::proxy::context::RequestContext;

    fn setup() -> (ServerRuntime, Analysis) {
        let server = ServerRuntime::new(ServerConfig {
            id: "s1".into(),
            addr: "127.0.0.1:9001".into(),
            circuit_breaker: Some(CircuitBreakerConfig {
                open_to_close_rate: 50,
                open_to_close_secs: 10,
                half_to_open_rate: 80,
                half_to_open_secs: 10,
                half_traffic_rate: 100,
            }),
            health_check_path: None,
        })
        .unwrap();
        let analysis = Analysis::new();
        for span in server.analysis_spans() {
            analysis.add_recent_count(server.id(), span);
        }
        (server, analysis)
    }

    #[test]
    fn test_default_chain_order() {
        assert_eq!(default_chain().names(), vec!["analysis", "circuit_breaker"]);
    }

    #[test]
    fn test_analysis_filter_records_outcomes() {
        let (server, analysis) = setup();
        let ctx = RequestContext::new(&server, &analysis);
        let chain = default_chain();

        chain.post(&ctx).unwrap();
        chain.post_err(&ctx);
        let counts = analysis.recent("s1", Duration::from_secs(1));
        assert_eq!((counts.total, counts.success, counts.failure), (2, 1, 1));
    }

    #[test]
    fn test_half_error_demotes_after_recording() {
        let (server, analysis) = setup();
        server.set_status(CircuitStatus::Half);
        let ctx = RequestContext::new(&server, &analysis);

        let chain = default_chain();
        assert!(chain.pre(&ctx).is_ok());
        chain.post_err(&ctx);

        assert_eq!(server.status(), CircuitStatus::Close);
        assert_eq!(analysis.recent_failure_count("s1", Duration::from_secs(10)), 1);
        assert_eq!(chain.pre(&ctx), Err(GatewayError::CircuitClosed));
    }
}
