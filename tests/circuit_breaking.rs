//! Circuit breaker behaviour through the HTTP surface.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use axum::http::StatusCode;

use api_gateway::resilience::CircuitStatus;

mod common;

#[tokio::test]
async fn test_failing_backend_trips_breaker() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (500, "boom".into())
        }
    })
    .await;

    let gateway = common::start_gateway(common::single_backend_config(backend, Some(common::policy()))).await;
    let client = common::client();

    // Backend 5xx is surfaced unchanged and recorded as a failure
    let res = client.get(gateway.url("/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().get("x-gateway-error").is_none());

    // Failure rate 100% >= 50%: the next call trips the breaker
    let res = client.get(gateway.url("/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers()["x-gateway-error"], "circuit-closed");
    assert_eq!(gateway.dispatcher.server("s1").unwrap().status(), CircuitStatus::Close);

    let res = client.get(gateway.url("/orders")).send().await.unwrap();
    assert_eq!(res.headers()["x-gateway-error"], "circuit-closed");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "rejections must not reach the backend");
}

#[tokio::test]
async fn test_half_success_reopens() {
    let backend = common::start_mock_backend("ok").await;
    let gateway = common::start_gateway(common::single_backend_config(backend, Some(common::policy()))).await;
    let client = common::client();

    let server = gateway.dispatcher.server("s1").unwrap();
    server.set_status(CircuitStatus::Close);
    let res = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert!(server.promote_to_half());
    let res = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");
    assert_eq!(server.status(), CircuitStatus::Open);
}

#[tokio::test]
async fn test_half_failure_closes() {
    let backend = common::start_programmable_backend(|_| async { (502, "bad".into()) }).await;
    let gateway = common::start_gateway(common::single_backend_config(backend, Some(common::policy()))).await;

    let server = gateway.dispatcher.server("s1").unwrap();
    server.set_status(CircuitStatus::Half);

    let res = common::client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(server.status(), CircuitStatus::Close);
}

#[tokio::test]
async fn test_half_sampling_rejects() {
    let backend = common::start_mock_backend("ok").await;
    let mut policy = common::policy();
    policy.half_traffic_rate = 0;
    let gateway = common::start_gateway(common::single_backend_config(backend, Some(policy))).await;

    gateway.dispatcher.server("s1").unwrap().set_status(CircuitStatus::Half);

    let res = common::client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers()["x-gateway-error"], "circuit-half-limited");
}

#[tokio::test]
async fn test_unreachable_backend_is_failure() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let gateway = common::start_gateway(common::single_backend_config(addr, Some(common::policy()))).await;

    let res = common::client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["x-gateway-error"], "backend-failure");
    assert_eq!(
        gateway.dispatcher.analysis().recent_failure_count("s1", Duration::from_secs(1)),
        1
    );
}

#[tokio::test]
async fn test_health_check_promotes_closed_server() {
    let backend = common::start_mock_backend("healthy").await;
    let mut config = common::single_backend_config(backend, Some(common::policy()));
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    let gateway = common::start_gateway(config).await;

    let server = gateway.dispatcher.server("s1").unwrap();
    server.set_status(CircuitStatus::Close);

    let mut status = server.status();
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        status = server.status();
        if status != CircuitStatus::Close {
            break;
        }
    }
    assert_eq!(status, CircuitStatus::Half);
}
