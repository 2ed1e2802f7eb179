//! Client IP resolution.
//!
//! Checks proxy headers in order (`CF-Connecting-IP`, first `X-Forwarded-For`
//! entry, `X-Real-IP`, `Fly-Client-IP`) and falls back to the socket peer
//! address when the server runs with connect info.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{Extensions, HeaderMap, request::Parts};

const SINGLE_IP_HEADERS: [&str; 2] = ["x-real-ip", "fly-client-ip"];

/// Resolve the client IP from request headers and extensions.
#[must_use]
pub fn resolve_client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    header_ip("cf-connecting-ip")
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| SINGLE_IP_HEADERS.iter().find_map(|name| header_ip(name)))
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

/// Extractor for the request's client IP.
///
/// Never rejects; an unresolvable address yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_client_ip(&parts.headers, &parts.extensions)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let map = headers(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(
            resolve_client_ip(&map, &Extensions::new()),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let map = headers(&[("x-forwarded-for", " 198.51.100.4 , 10.0.0.2")]);
        assert_eq!(
            resolve_client_ip(&map, &Extensions::new()),
            Some("198.51.100.4".parse().unwrap())
        );
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo::<SocketAddr>("192.0.2.9:4567".parse().unwrap()));
        let map = headers(&[("x-real-ip", "not-an-ip")]);
        assert_eq!(
            resolve_client_ip(&map, &extensions),
            Some("192.0.2.9".parse().unwrap())
        );
    }

    #[test]
    fn test_unparseable_headers_without_peer_is_none() {
        let map = headers(&[("x-forwarded-for", "unknown"), ("x-real-ip", "")]);
        assert_eq!(resolve_client_ip(&map, &Extensions::new()), None);
    }
}
