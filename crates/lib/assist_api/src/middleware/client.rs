//! Client identity: peer address and user agent.

use std::net::SocketAddr;

use assist_core::models::auth::ClientMeta;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};

use crate::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the caller's address. `X-Forwarded-For` is only honoured when the
/// deployment sits behind a trusted proxy.
pub fn client_meta(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> ClientMeta {
    let forwarded = trust_proxy
        .then(|| {
            headers
                .get(X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        })
        .flatten();

    let ip = forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientMeta::new(ip, user_agent)
}

/// Extractor for the caller's [`ClientMeta`].
#[derive(Debug, Clone)]
pub struct Client(pub ClientMeta);

impl FromRequestParts<AppState> for Client {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Client(client_meta(
            &parts.headers,
            &parts.extensions,
            state.config.trust_proxy,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(xff: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(xff).unwrap());
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));
        headers
    }

    fn peer() -> Extensions {
        let mut ext = Extensions::new();
        ext.insert(ConnectInfo(SocketAddr::from(([192, 168, 0, 9], 5000))));
        ext
    }

    #[test]
    fn peer_address_by_default() {
        let meta = client_meta(&headers("1.2.3.4"), &peer(), false);
        assert_eq!(meta.ip, "192.168.0.9");
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8"));
    }

    #[test]
    fn first_forwarded_hop_behind_proxy() {
        let meta = client_meta(&headers("1.2.3.4, 10.0.0.1"), &peer(), true);
        assert_eq!(meta.ip, "1.2.3.4");
    }

    #[test]
    fn unknown_without_peer() {
        let meta = client_meta(&HeaderMap::new(), &Extensions::new(), false);
        assert_eq!(meta.ip, "unknown");
        assert!(meta.user_agent.is_none());
    }
}
