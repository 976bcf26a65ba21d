use std::convert::Infallible;
use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use storefront_domain::ClientContext;

const FALLBACK_IP: &str = "127.0.0.1";

/// Caller address and user agent, taken from the request before the body is read.
#[derive(Debug, Clone)]
pub struct Client(pub ClientContext);

#[async_trait]
impl<S> FromRequestParts<S> for Client
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Client(client_context(&parts.headers, peer)))
    }
}

pub fn client_context(headers: &HeaderMap, peer: Option<String>) -> ClientContext {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ClientContext {
        ip_address: Some(
            forwarded
                .or(peer)
                .unwrap_or_else(|| FALLBACK_IP.to_string()),
        ),
        user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("198.51.100.7, 10.0.0.1"),
        );
        let client = client_context(&headers, Some("10.0.0.2".to_string()));
        assert_eq!(client.ip_address.as_deref(), Some("198.51.100.7"));
    }

    #[test]
    fn falls_back_to_peer_then_loopback() {
        let headers = HeaderMap::new();
        let client = client_context(&headers, Some("10.0.0.2".to_string()));
        assert_eq!(client.ip_address.as_deref(), Some("10.0.0.2"));

        let client = client_context(&headers, None);
        assert_eq!(client.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(client.user_agent.is_none());
    }
}
