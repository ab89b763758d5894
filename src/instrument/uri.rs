//! Request target normalization.
//!
//! Every request is reported under two strings:
//!
//! - **uri**: path plus `?query` when a query is present
//! - **path**: path only, used where cardinality matters (metric tags)
//!
//! HTTP/2 `CONNECT` requests carry no path at all (RFC 7540 §8.3), only an
//! authority. Both strings are the raw `host:port` for those.

use axum::http::header::HOST;
use axum::http::{Method, Request, Version};

/// The pair of strings a request is logged under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUri {
    pub uri: String,
    pub path: String,
}

impl NormalizedUri {
    /// Normalize the target of `req`.
    pub fn of<B>(req: &Request<B>) -> Self {
        Self {
            uri: uri(req),
            path: path(req),
        }
    }
}

/// Path plus query of `req`, or the authority for HTTP/2 `CONNECT`.
pub fn uri<B>(req: &Request<B>) -> String {
    if is_connect_tunnel(req) {
        return authority(req).to_string();
    }

    let path = request_path(req);
    match req.uri().query() {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_string(),
    }
}

/// Path of `req` without the query, or the authority for HTTP/2 `CONNECT`.
pub fn path<B>(req: &Request<B>) -> String {
    if is_connect_tunnel(req) {
        return authority(req).to_string();
    }

    request_path(req).to_string()
}

#[inline]
fn is_connect_tunnel<B>(req: &Request<B>) -> bool {
    req.version() == Version::HTTP_2 && req.method() == Method::CONNECT
}

#[inline]
fn request_path<B>(req: &Request<B>) -> &str {
    match req.uri().path() {
        "" => "/",
        path => path,
    }
}

/// `host:port` from the request target, falling back to the Host header.
fn authority<B>(req: &Request<B>) -> &str {
    if let Some(authority) = req.uri().authority() {
        return authority.as_str();
    }

    req.headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
