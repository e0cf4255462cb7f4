//! Circuit breaker for backend protection.
//!
//! # States
//! - Open: normal operation, requests pass through
//! - Half: probation, only a sampled share of requests pass
//! - Close: backend assumed down, requests fail fast
//!
//! The names follow the electrical analogy: an open circuit lets traffic flow.
//!
//! # State Transitions
//! ```text
//! Open  → Close: failure rate over open_to_close >= open_to_close_rate (pre)
//! Half  → Open:  success rate over half_to_open >= half_to_open_rate (post)
//! Half  → Close: any failed call (post_err)
//! Close → Half:  external recovery signal (health checker, admin API)
//! ```
//!
//! # Design Decisions
//! - Per-server breaker, status held in an atomic on the server runtime
//! - Fail fast in Close state (backend never contacted)
//! - Rates use truncating integer percentages; a zero total has no failure
//!   rate and a success rate of 100

use std::time::{Duration, Instant};
use rand::Rng;
use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::proxy::error::GatewayError;
use crate::proxy::filter::{Filter, FilterContext};

/// Denominator of every rate.
pub const RATE_BASE: u32 = 100;

/// Breaker status of one server.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitStatus {
    Open = 0,
    Half = 1,
    Close = 2,
}

impl From<u8> for CircuitStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitStatus::Half,
            2 => CircuitStatus::Close,
            _ => CircuitStatus::Open,
        }
    }
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitStatus::Open => "open",
            CircuitStatus::Half => "half",
            CircuitStatus::Close => "close",
        }
    }
}

impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker policy of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub open_to_close_rate: u32,
    pub open_to_close: Duration,
    pub half_to_open_rate: u32,
    pub half_to_open: Duration,
    pub half_traffic_rate: u32,
}

impl From<&CircuitBreakerConfig> for CircuitBreaker {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            open_to_close_rate: config.open_to_close_rate,
            open_to_close: Duration::from_secs(config.open_to_close_secs),
            half_to_open_rate: config.half_to_open_rate,
            half_to_open: Duration::from_secs(config.half_to_open_secs),
            half_traffic_rate: config.half_traffic_rate,
        }
    }
}

/// Failure percentage over the Open to Close window as of `now`, `None`
/// without traffic.
pub fn failure_rate(ctx: &dyn FilterContext, cb: &CircuitBreaker, now: Instant) -> Option<u32> {
    let counts = ctx.analysis().recent_at(ctx.server_key(), cb.open_to_close, now);
    if counts.total == 0 {
        return None;
    }
    Some((counts.failure * RATE_BASE as u64 / counts.total) as u32)
}

/// Success percentage over the Half to Open window as of `now`, 100 without
/// traffic.
pub fn success_rate(ctx: &dyn FilterContext, cb: &CircuitBreaker, now: Instant) -> u32 {
    let counts = ctx.analysis().recent_at(ctx.server_key(), cb.half_to_open, now);
    if counts.total == 0 {
        return RATE_BASE;
    }
    (counts.success * RATE_BASE as u64 / counts.total) as u32
}

/// Admit a request with probability `rate` percent.
pub fn limit_allow(rate: u32) -> bool {
    rand::thread_rng().gen_range(0..RATE_BASE) < rate
}

/// Gates backend calls on the destination server's breaker.
#[derive(Debug, Default, Clone, Copy)]
pub struct CircuitBreakerFilter;

impl CircuitBreakerFilter {
    pub fn new() -> Self {
        Self
    }

    /// [`Filter::pre`] with rates read as of `now`.
    pub fn pre_at(&self, ctx: &dyn FilterContext, now: Instant) -> Result<(), GatewayError> {
        let Some(cb) = ctx.circuit_breaker() else {
            return Ok(());
        };

        match ctx.circuit_status() {
            CircuitStatus::Open => {
                let tripped = matches!(failure_rate(ctx, cb, now), Some(rate) if rate >= cb.open_to_close_rate);
                if tripped {
                    ctx.change_circuit_status(CircuitStatus::Open, CircuitStatus::Close);
                    return Err(GatewayError::CircuitClosed);
                }
                Ok(())
            }
            CircuitStatus::Half => {
                if limit_allow(cb.half_traffic_rate) {
                    Ok(())
                } else {
                    Err(GatewayError::CircuitHalfLimited)
                }
            }
            CircuitStatus::Close => Err(GatewayError::CircuitClosed),
        }
    }

    /// [`Filter::post`] with rates read as of `now`.
    pub fn post_at(&self, ctx: &dyn FilterContext, now: Instant) {
        let Some(cb) = ctx.circuit_breaker() else {
            return;
        };

        if ctx.is_circuit_half() && success_rate(ctx, cb, now) >= cb.half_to_open_rate {
            ctx.change_circuit_status(CircuitStatus::Half, CircuitStatus::Open);
        }
    }
}

impl Filter for CircuitBreakerFilter {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn pre(&self, ctx: &dyn FilterContext) -> Result<(), GatewayError> {
        self.pre_at(ctx, Instant::now())
    }

    fn post(&self, ctx: &dyn FilterContext) -> Result<(), GatewayError> {
        self.post_at(ctx, Instant::now());
        Ok(())
    }

    fn post_err(&self, ctx: &dyn FilterContext) {
        if ctx.circuit_breaker().is_some() && ctx.is_circuit_half() {
            ctx.change_circuit_status(CircuitStatus::Half, CircuitStatus::Close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analysis, Outcome};
    use crate::config::ServerConfig;
    use crate::load_balancer::server::ServerRuntime;
    use crate::proxy::context::RequestContext;

    fn policy() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            open_to_close_rate: 50,
            open_to_close_secs: 10,
            half_to_open_rate: 80,
            half_to_open_secs: 10,
            half_traffic_rate: 30,
        }
    }

    fn setup(cb: Option<CircuitBreakerConfig>) -> (ServerRuntime, Analysis) {
        let server = ServerRuntime::new(ServerConfig {
            id: "s1".into(),
            addr: "127.0.0.1:9001".into(),
            circuit_breaker: cb,
            health_check_path: None,
        })
        .unwrap();
        let analysis = Analysis::new();
        for span in server.analysis_spans() {
            analysis.add_recent_count(server.id(), span);
        }
        (server, analysis)
    }

    fn record(analysis: &Analysis, failures: usize, successes: usize) {
        for _ in 0..failures {
            analysis.record("s1", Outcome::Failure);
        }
        for _ in 0..successes {
            analysis.record("s1", Outcome::Success);
        }
    }

    #[test]
    fn test_rates() {
        let (server, analysis) = setup(Some(policy()));
        let ctx = RequestContext::new(&server, &analysis);
        let cb = *server.circuit_breaker().unwrap();

        assert_eq!(failure_rate(&ctx, &cb, Instant::now()), None);
        assert_eq!(success_rate(&ctx, &cb, Instant::now()), 100);

        record(&analysis, 1, 2);
        // 33.3 and 66.6 truncate
        assert_eq!(failure_rate(&ctx, &cb, Instant::now()), Some(33));
        assert_eq!(success_rate(&ctx, &cb, Instant::now()), 66);
    }

    /// Half to Open reads only its own window: failures that left the 1s
    /// window still count in the 30s one.
    #[test]
    fn test_half_reads_its_own_window() {
        let split = |half_to_open_secs, open_to_close_secs| CircuitBreakerConfig {
            open_to_close_rate: 50,
            open_to_close_secs,
            half_to_open_rate: 80,
            half_to_open_secs,
            half_traffic_rate: 100,
        };
        let filter = CircuitBreakerFilter::new();

        for (cb, promoted) in [(split(1, 30), true), (split(30, 1), false)] {
            let (server, analysis) = setup(Some(cb));
            let ctx = RequestContext::new(&server, &analysis);
            server.set_status(CircuitStatus::Half);

            let start = Instant::now();
            for _ in 0..5 {
                analysis.record_at("s1", Outcome::Failure, start);
            }
            let later = start + Duration::from_secs(20);
            analysis.record_at("s1", Outcome::Success, later);
            analysis.record_at("s1", Outcome::Success, later);

            let now = later + Duration::from_millis(500);
            let expected = if promoted { 100 } else { 28 };
            assert_eq!(success_rate(&ctx, server.circuit_breaker().unwrap(), now), expected);

            filter.post_at(&ctx, now);
            let status = if promoted { CircuitStatus::Open } else { CircuitStatus::Half };
            assert_eq!(server.status(), status);
        }
    }

    #[test]
    fn test_open_reads_its_own_window() {
        let cb = CircuitBreakerConfig {
            open_to_close_rate: 50,
            open_to_close_secs: 1,
            half_to_open_rate: 80,
            half_to_open_secs: 30,
            half_traffic_rate: 100,
        };
        let (server, analysis) = setup(Some(cb));
        let ctx = RequestContext::new(&server, &analysis);
        let filter = CircuitBreakerFilter::new();

        let start = Instant::now();
        for _ in 0..5 {
            analysis.record_at("s1", Outcome::Failure, start);
        }
        let later = start + Duration::from_secs(20);
        analysis.record_at("s1", Outcome::Success, later);

        // The 30s window is 83% failures, the 1s window none
        assert!(filter.pre_at(&ctx, later).is_ok());
        assert_eq!(server.status(), CircuitStatus::Open);

        analysis.record_at("s1", Outcome::Failure, later);
        assert_eq!(filter.pre_at(&ctx, later), Err(GatewayError::CircuitClosed));
        assert_eq!(server.status(), CircuitStatus::Close);
    }

    #[test]
    fn test_open_trips_at_threshold() {
        let (server, analysis) = setup(Some(policy()));
        let ctx = RequestContext::new(&server, &analysis);
        let filter = CircuitBreakerFilter::new();

        record(&analysis, 4, 6);
        assert!(filter.pre(&ctx).is_ok());
        assert_eq!(server.status(), CircuitStatus::Open);

        record(&analysis, 1, 0);
        assert!(filter.pre(&ctx).is_ok());
        assert_eq!(server.status(), CircuitStatus::Open);

        record(&analysis, 2, 0);
        assert_eq!(filter.pre(&ctx), Err(GatewayError::CircuitClosed));
        assert_eq!(server.status(), CircuitStatus::Close);
    }

    #[test]
    fn test_open_without_traffic_admits() {
        let mut cb = policy();
        cb.open_to_close_rate = 0;
        let (server, analysis) = setup(Some(cb));
        let ctx = RequestContext::new(&server, &analysis);

        assert!(CircuitBreakerFilter.pre(&ctx).is_ok());
        assert_eq!(server.status(), CircuitStatus::Open);
    }

    #[test]
    fn test_close_always_rejects() {
        let (server, analysis) = setup(Some(policy()));
        let ctx = RequestContext::new(&server, &analysis);
        let filter = CircuitBreakerFilter::new();
        server.set_status(CircuitStatus::Close);

        record(&analysis, 0, 50);
        for _ in 0..100 {
            assert_eq!(filter.pre(&ctx), Err(GatewayError::CircuitClosed));
            assert!(filter.post(&ctx).is_ok());
            filter.post_err(&ctx);
        }
        assert_eq!(server.status(), CircuitStatus::Close);

        assert!(server.promote_to_half());
        assert_eq!(server.status(), CircuitStatus::Half);
    }

    #[test]
    fn test_half_promotes_to_open() {
        let (server, analysis) = setup(Some(policy()));
        let ctx = RequestContext::new(&server, &analysis);
        let filter = CircuitBreakerFilter::new();
        server.set_status(CircuitStatus::Half);

        record(&analysis, 2, 7);
        filter.post(&ctx).unwrap();
        assert_eq!(server.status(), CircuitStatus::Half);

        record(&analysis, 0, 1);
        filter.post(&ctx).unwrap();
        assert_eq!(server.status(), CircuitStatus::Open);

        // Stays Open while the failure rate is below the trip threshold.
        assert!(filter.pre(&ctx).is_ok());
        filter.post(&ctx).unwrap();
        assert_eq!(server.status(), CircuitStatus::Open);
    }

    #[test]
    fn test_half_error_closes() {
        let (server, analysis) = setup(Some(policy()));
        let ctx = RequestContext::new(&server, &analysis);
        let filter = CircuitBreakerFilter::new();
        server.set_status(CircuitStatus::Half);

        record(&analysis, 0, 100);
        filter.post_err(&ctx);
        assert_eq!(server.status(), CircuitStatus::Close);
    }

    #[test]
    fn test_open_error_keeps_status() {
        let (server, analysis) = setup(Some(policy()));
        let ctx = RequestContext::new(&server, &analysis);

        CircuitBreakerFilter.post_err(&ctx);
        assert_eq!(server.status(), CircuitStatus::Open);
    }

    #[test]
    fn test_half_sampling_converges() {
        let (server, analysis) = setup(Some(policy()));
        let ctx = RequestContext::new(&server, &analysis);
        let filter = CircuitBreakerFilter::new();
        server.set_status(CircuitStatus::Half);

        let trials = 20_000;
        let mut admitted = 0;
        for _ in 0..trials {
            match filter.pre(&ctx) {
                Ok(()) => admitted += 1,
                Err(e) => assert_eq!(e, GatewayError::CircuitHalfLimited),
            }
        }

        let fraction = admitted as f64 / trials as f64;
        assert!((fraction - 0.30).abs() < 0.03, "admitted fraction {fraction}");
        assert_eq!(server.status(), CircuitStatus::Half);
    }

    #[test]
    fn test_without_policy_is_passthrough() {
        let (server, analysis) = setup(None);
        let ctx = RequestContext::new(&server, &analysis);
        let filter = CircuitBreakerFilter::new();
        server.set_status(CircuitStatus::Close);

        assert!(filter.pre(&ctx).is_ok());
        filter.post_err(&ctx);
        assert_eq!(server.status(), CircuitStatus::Close);
    }

    #[test]
    fn test_limit_allow_bounds() {
        assert!((0..1000).all(|_| limit_allow(100)));
        assert!((0..1000).all(|_| !limit_allow(0)));
    }
}
