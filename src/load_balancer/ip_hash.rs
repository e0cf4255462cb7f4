//! Client-affinity load balancing strategy.
//!
//! The client is identified by the first `X-Forwarded-For` entry, then
//! `X-Real-IP`, then the peer address. Requests without any of them fall back
//! to a random member.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use crate::load_balancer::LoadBalancer;

/// Hashes the client address onto the member list.
#[derive(Debug, Default)]
pub struct IpHash;

impl IpHash {
    pub fn new() -> Self {
        Self
    }
}

fn client_ip(req: &Request<Body>) -> Option<String> {
    let headers = req.headers();
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        return Some(real.trim().to_string());
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

impl LoadBalancer for IpHash {
    fn next_server<'a>(&self, req: &Request<Body>, members: &'a [String]) -> Option<&'a str> {
        if members.is_empty() {
            return None;
        }

        let index = match client_ip(req) {
            Some(ip) => {
                let mut hasher = DefaultHasher::new();
                ip.hash(&mut hasher);
                (hasher.finish() % members.len() as u64) as usize
            }
            None => fastrand::usize(..members.len()),
        };
        Some(members[index].as_str())
    }
}
