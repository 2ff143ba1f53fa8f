//! Client address extraction for admission control
//!
//! Proxy headers are honoured only when the direct peer is a trusted proxy.
//! A header that is present but does not hold an IP address is a client
//! error: the request is rejected and no limiter state is created for it.

use std::net::{IpAddr, SocketAddr};

use log::{debug, warn};
use warp::hyper::HeaderMap;

use crate::error::{ParlorError, Result};

/// Headers consulted, in order, when the peer is a trusted proxy
const PROXY_HEADERS: &[&str] = &["x-real-ip", "x-forwarded-for"];

/// Configuration for IP extraction behavior
#[derive(Debug, Clone, Default)]
pub struct IpExtractionConfig {
    /// Whether to trust proxy headers (X-Real-IP, X-Forwarded-For)
    pub trust_proxy_headers: bool,
    /// Peers whose proxy headers are believed. Empty means any peer.
    pub trusted_proxies: Vec<IpAddr>,
}

impl IpExtractionConfig {
    /// Trust headers from the listed proxies only
    pub fn behind_proxies(trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            trust_proxy_headers: true,
            trusted_proxies,
        }
    }

    fn trusts(&self, peer: Option<IpAddr>) -> bool {
        if !self.trust_proxy_headers {
            return false;
        }
        if self.trusted_proxies.is_empty() {
            return true;
        }
        peer.map_or(false, |ip| self.trusted_proxies.contains(&ip))
    }
}

/// Derive the rate-limit key for a request
pub fn extract_client_ip(
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    config: &IpExtractionConfig,
) -> Result<IpAddr> {
    let direct_ip = remote_addr.map(|addr| addr.ip());

    if config.trusts(direct_ip) {
        for name in PROXY_HEADERS {
            let Some(value) = headers.get(*name) else {
                continue;
            };
            let raw = value
                .to_str()
                .map_err(|_| ParlorError::InvalidClientAddress(format!("non-ASCII {} header", name)))?;
            // X-Forwarded-For can hold "client, proxy1, proxy2"; the leftmost is the client
            let candidate = raw.split(',').next().unwrap_or("").trim();
            if candidate.is_empty() {
                continue;
            }
            return match candidate.parse::<IpAddr>() {
                Ok(ip) => {
                    debug!("Client IP {} taken from {}", ip, name);
                    Ok(ip)
                }
                Err(_) => {
                    warn!("Invalid IP format in {} header: {}", name, candidate);
                    Err(ParlorError::InvalidClientAddress(candidate.to_string()))
                }
            };
        }
    }

    direct_ip.ok_or_else(|| ParlorError::InvalidClientAddress("missing peer address".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::hyper::header::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("203.0.113.100:12345".parse().unwrap())
    }

    #[test]
    fn test_direct_address_without_proxy_trust() {
        let config = IpExtractionConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));

        let ip = extract_client_ip(&headers, peer(), &config).unwrap();
        assert_eq!(ip, "203.0.113.100".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_real_ip_preferred_over_forwarded_for() {
        let config = IpExtractionConfig::behind_proxies(Vec::new());
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.8"));

        let ip = extract_client_ip(&headers, peer(), &config).unwrap();
        assert_eq!(ip, "198.51.100.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_forwarded_for_leftmost_entry() {
        let config = IpExtractionConfig::behind_proxies(vec!["203.0.113.100".parse().unwrap()]);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.8, 10.0.0.1"));

        let ip = extract_client_ip(&headers, peer(), &config).unwrap();
        assert_eq!(ip, "198.51.100.8".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_untrusted_proxy_headers_ignored() {
        let config = IpExtractionConfig::behind_proxies(vec!["192.0.2.1".parse().unwrap()]);
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));

        let ip = extract_client_ip(&headers, peer(), &config).unwrap();
        assert_eq!(ip, "203.0.113.100".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let config = IpExtractionConfig::behind_proxies(Vec::new());
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));

        let result = extract_client_ip(&headers, peer(), &config);
        assert!(matches!(result, Err(ParlorError::InvalidClientAddress(_))));
    }

    #[test]
    fn test_missing_peer_rejected() {
        let config = IpExtractionConfig::default();
        let result = extract_client_ip(&HeaderMap::new(), None, &config);
        assert!(result.is_err());
    }
}
