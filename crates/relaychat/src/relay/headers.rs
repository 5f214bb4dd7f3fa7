//! Upstream credential and forwarded-context headers

use axum::http::{HeaderMap, header};
use std::fmt;
use std::net::SocketAddr;

/// Header carrying the caller's origin to the provider
pub const REFERER_HEADER: &str = "HTTP-Referer";

/// Header carrying the caller's network address to the provider
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// Header carrying the application title to the provider
pub const TITLE_HEADER: &str = "X-Title";

/// Provider bearer credential. Never printed.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Read the credential from an environment variable
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().and_then(Self::new)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted, {} chars>)", self.0.len())
    }
}

/// Origin and address of the inbound caller, with fallbacks applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedContext {
    pub origin: String,
    pub client_addr: String,
}

impl ForwardedContext {
    /// Derive the context from inbound headers and the socket peer.
    ///
    /// Origin: `Origin`, then `Referer`, then `default_origin`.
    /// Address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
    /// peer address, then `default_addr`.
    pub fn from_request(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        default_origin: &str,
        default_addr: &str,
    ) -> Self {
        let origin = header_str(headers, header::ORIGIN.as_str())
            .or_else(|| header_str(headers, header::REFERER.as_str()))
            .unwrap_or(default_origin)
            .to_string();

        let client_addr = header_str(headers, "x-forwarded-for")
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| header_str(headers, "x-real-ip").map(String::from))
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| default_addr.to_string());

        Self {
            origin,
            client_addr,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("sk-secret-value").unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("15 chars"));
    }

    #[test]
    fn test_blank_credential_rejected() {
        assert!(Credential::new("   ").is_none());
        assert!(Credential::new("").is_none());
    }

    #[test]
    fn test_fallbacks_when_headers_absent() {
        let context =
            ForwardedContext::from_request(&HeaderMap::new(), None, "http://localhost", "127.0.0.1");
        assert_eq!(context.origin, "http://localhost");
        assert_eq!(context.client_addr, "127.0.0.1");
    }

    #[test]
    fn test_origin_preferred_over_referer() {
        let mut headers = HeaderMap::new();
        headers.insert("referer", HeaderValue::from_static("https://app.example/page"));
        let context = ForwardedContext::from_request(&headers, None, "http://localhost", "127.0.0.1");
        assert_eq!(context.origin, "https://app.example/page");

        headers.insert("origin", HeaderValue::from_static("https://app.example"));
        let context = ForwardedContext::from_request(&headers, None, "http://localhost", "127.0.0.1");
        assert_eq!(context.origin, "https://app.example");
    }

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let context = ForwardedContext::from_request(&headers, None, "http://localhost", "127.0.0.1");
        assert_eq!(context.client_addr, "203.0.113.9");
    }

    #[test]
    fn test_peer_address_used_before_default() {
        let peer: SocketAddr = "192.0.2.7:51000".parse().unwrap();
        let context =
            ForwardedContext::from_request(&HeaderMap::new(), Some(peer), "http://localhost", "127.0.0.1");
        assert_eq!(context.client_addr, "192.0.2.7");
    }
}
