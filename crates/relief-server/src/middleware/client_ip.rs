//! Client address resolution
//!
//! Requests normally arrive through a CDN or reverse proxy, so the socket
//! peer is the last resort. Headers are tried in order and the first value
//! that parses as an IP address wins:
//!
//! 1. `CF-Connecting-IP`
//! 2. `True-Client-IP`
//! 3. `X-Real-IP`
//! 4. first valid entry of `X-Forwarded-For`
//! 5. the socket peer (`ConnectInfo<SocketAddr>`)

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
};
use relief_common::net::parse_ip;

const SINGLE_VALUE_HEADERS: [&str; 3] = ["cf-connecting-ip", "true-client-ip", "x-real-ip"];

/// Resolve the client address from proxy headers, falling back to `peer`
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    for name in SINGLE_VALUE_HEADERS {
        if let Some(ip) = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip)
        {
            return Some(ip);
        }
    }

    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find_map(parse_ip);

    forwarded.or(peer)
}

/// Resolve the client address of an in-flight request
pub fn client_ip(request: &Request) -> Option<IpAddr> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    resolve_client_ip(request.headers(), peer)
}
