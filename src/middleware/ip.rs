//! Client address resolution for log and audit fields.
//!
//! # Security Warning
//!
//! `X-Forwarded-For` and `X-Real-IP` are client-controlled unless a trusted
//! reverse proxy overwrites them. Values resolved here are for reporting
//! only and must never drive access decisions.
//!
//! # Resolution Order
//!
//! 1. First entry of `X-Forwarded-For`
//! 2. `X-Real-IP`
//! 3. Peer address from `ConnectInfo<SocketAddr>` (when the server is
//!    started with `into_make_service_with_connect_info`)
//! 4. [`UNKNOWN_IP`]

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderName, Request};

/// Header carrying the proxy chain, client first.
pub static FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Header set by some proxies to the single client address.
pub static REAL_IP_HEADER: HeaderName = HeaderName::from_static("x-real-ip");

/// Fallback value when no client address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Where a resolved client address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientIp<'a> {
    ForwardedFor(&'a str),
    RealIp(&'a str),
    Peer(SocketAddr),
    Unknown,
}

#[inline]
fn resolve<B>(req: &Request<B>) -> ClientIp<'_> {
    if let Some(forwarded) = req.headers().get(&FORWARDED_FOR_HEADER)
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
    {
        return ClientIp::ForwardedFor(first.trim());
    }

    if let Some(real_ip) = req.headers().get(&REAL_IP_HEADER)
        && let Ok(value) = real_ip.to_str()
    {
        return ClientIp::RealIp(value.trim());
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return ClientIp::Peer(*addr);
    }

    ClientIp::Unknown
}

/// Best-effort client address of `req`.
///
/// Borrowed for the [`UNKNOWN_IP`] fallback, owned otherwise.
#[inline]
pub fn extract_client_ip<B>(req: &Request<B>) -> Cow<'static, str> {
    match resolve(req) {
        ClientIp::ForwardedFor(ip) | ClientIp::RealIp(ip) => Cow::Owned(ip.to_string()),
        ClientIp::Peer(addr) => Cow::Owned(addr.ip().to_string()),
        ClientIp::Unknown => Cow::Borrowed(UNKNOWN_IP),
    }
}
