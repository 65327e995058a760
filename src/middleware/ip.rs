use axum::{
    extract::{connect_info::ConnectInfo, Request},
    http::HeaderMap,
};
use std::net::{IpAddr, SocketAddr};

/// Identifier used when neither trusted headers nor connection info are available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client IP from proxy headers. Only meaningful behind a proxy that overwrites them.
pub fn extract_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }
    None
}

/// Resolves the key the rate limiter and the request log use for a client.
///
/// Proxy headers are consulted only when `trust_proxy_headers` is set; otherwise a
/// client could pick its own bucket.
pub fn client_id(headers: &HeaderMap, remote: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = extract_ip_from_headers(headers) {
            return ip.to_string();
        }
    }
    match remote {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

pub fn client_id_for(req: &Request, trust_proxy_headers: bool) -> String {
    let remote = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    client_id(req.headers(), remote, trust_proxy_headers)
}
