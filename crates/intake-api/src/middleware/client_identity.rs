//! Client identity resolution.
//!
//! The address comes from the first `X-Forwarded-For` entry, then
//! `X-Real-IP`, then the socket peer, else `unknown`. Combined with the
//! user agent it forms the rate-limit key.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

const UNKNOWN: &str = "unknown";

/// Who sent a request, as far as the relay can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Resolved client address.
    pub address: String,
    /// `User-Agent` header, empty when absent.
    pub user_agent: String,
}

impl ClientIdentity {
    /// Resolves identity from headers and an optional peer address.
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let address = forwarded_for(headers)
            .or_else(|| header_value(headers, "x-real-ip"))
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let user_agent = header_value(headers, header::USER_AGENT.as_str()).unwrap_or_default();

        Self { address, user_agent }
    }

    /// Key under which the rate limiter tracks this client.
    pub fn rate_limit_key(&self) -> String {
        format!("{}|{}", self.address, self.user_agent)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")?
        .split(',')
        .map(str::trim)
        .find(|entry| !entry.is_empty())
        .map(String::from)
}

/// Axum middleware that attaches a [`ClientIdentity`] to every request.
pub async fn client_identity_middleware(mut req: Request<Body>, next: Next) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr);
    let identity = ClientIdentity::from_parts(req.headers(), peer);

    req.extensions_mut().insert(identity);

    next.run(req).await
}
