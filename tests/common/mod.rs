//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use api_gateway::config::{
    ApiConfig, BindConfig, CircuitBreakerConfig, ClusterConfig, GatewayConfig, LoadBalance,
    MatchConfig, NodeConfig, ServerConfig,
};
use api_gateway::lifecycle::Shutdown;
use api_gateway::{Dispatcher, GatewayServer};

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend. The handler receives the request path.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(path).await;
                        let reason = StatusCode::from_u16(status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");

                        let response_str = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read the request head and return its path.
async fn read_request_path(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub dispatcher: Arc<Dispatcher>,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let server = GatewayServer::new(config).unwrap();
    let dispatcher = server.dispatcher().clone();
    let shutdown = server.shutdown().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (updates, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let _ = server.run(listener, Some(rx)).await;
    });

    TestGateway {
        addr,
        dispatcher,
        shutdown,
        updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

// --- Config builders ---

pub fn policy() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        open_to_close_rate: 50,
        open_to_close_secs: 10,
        half_to_open_rate: 80,
        half_to_open_secs: 10,
        half_traffic_rate: 100,
    }
}

pub fn server(id: &str, addr: SocketAddr, cb: Option<CircuitBreakerConfig>) -> ServerConfig {
    ServerConfig {
        id: id.into(),
        addr: addr.to_string(),
        circuit_breaker: cb,
        health_check_path: None,
    }
}

pub fn cluster(id: &str) -> ClusterConfig {
    ClusterConfig {
        id: id.into(),
        load_balance: LoadBalance::RoundRobin,
    }
}

pub fn bind(server: &str, cluster: &str) -> BindConfig {
    BindConfig {
        server: server.into(),
        cluster: cluster.into(),
    }
}

pub fn api(name: &str, prefix: &str, clusters: &[&str]) -> ApiConfig {
    ApiConfig {
        name: name.into(),
        priority: 0,
        matches: MatchConfig {
            path_prefix: Some(prefix.into()),
            ..Default::default()
        },
        nodes: clusters
            .iter()
            .map(|c| NodeConfig {
                cluster: c.to_string(),
                rewrite: None,
            })
            .collect(),
    }
}

/// One server `s1` in cluster `c1` behind API `all` on `/`.
pub fn single_backend_config(addr: SocketAddr, cb: Option<CircuitBreakerConfig>) -> GatewayConfig {
    let mut config = GatewayConfig {
        servers: vec![server("s1", addr, cb)],
        clusters: vec![cluster("c1")],
        binds: vec![bind("s1", "c1")],
        apis: vec![api("all", "/", &["c1"])],
        ..Default::default()
    };
    config.health_check.enabled = false;
    config
}
