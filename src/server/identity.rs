use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

use crate::config::RateLimitConfig;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Which peers may vouch for a client address through proxy headers.
#[derive(Debug, Clone, Default)]
pub struct IdentityPolicy {
    trust_forwarded_headers: bool,
    trusted_proxies: Vec<IpAddr>,
}

impl IdentityPolicy {
    pub fn new(trust_forwarded_headers: bool, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            trust_forwarded_headers,
            trusted_proxies,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.trust_forwarded_headers,
            config.trusted_proxies.clone(),
        )
    }

    fn trusts(&self, peer: Option<IpAddr>) -> bool {
        if !self.trust_forwarded_headers {
            return false;
        }
        if self.trusted_proxies.is_empty() {
            return true;
        }
        peer.is_some_and(|ip| self.trusted_proxies.contains(&ip))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
}

/// Derives the rate-limit key for a request: first hop of `X-Forwarded-For`,
/// then `X-Real-IP`, then the peer address without its port. Header values are
/// not validated as IP addresses.
pub fn resolve_client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    policy: &IdentityPolicy,
) -> String {
    let peer_ip = peer.map(|addr| addr.ip());

    if policy.trusts(peer_ip) {
        if let Some(first) = header_str(headers, X_FORWARDED_FOR)
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
        if let Some(real_ip) = header_str(headers, X_REAL_IP) {
            return real_ip.to_string();
        }
    }

    peer_ip.map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string())
}
