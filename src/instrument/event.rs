//! The per-request record handed to log sinks.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::header::{HOST, REFERER, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, Method, Request, StatusCode, Version};
use chrono::{DateTime, Utc};

use super::uri::NormalizedUri;
use crate::middleware::ip::FORWARDED_FOR_HEADER;

/// Nanoseconds per second, as a float for duration conversions.
pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Everything a sink may report about one handled request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLog {
    /// Wall-clock time the request was received.
    pub timestamp: DateTime<Utc>,
    /// Time from receiving the request to the end of the response body.
    pub duration: Duration,
    pub method: Method,
    pub version: Version,
    pub uri: String,
    pub path: String,
    pub host: String,
    pub status: StatusCode,
    /// Response body bytes sent to the client.
    pub size: u64,
    pub referer: String,
    /// Raw `X-Forwarded-For` value, empty if absent.
    pub forwarded_for: String,
    pub user_agent: String,
    /// Peer address, when the server exposes `ConnectInfo<SocketAddr>`.
    pub remote_addr: Option<SocketAddr>,
}

impl RequestLog {
    /// Capture the request-derived fields of `req`.
    ///
    /// Response fields start out as `200 OK`, zero bytes and zero duration;
    /// the dispatcher fills them in when the response completes.
    pub fn from_request<B>(req: &Request<B>, timestamp: DateTime<Utc>) -> Self {
        let NormalizedUri { uri, path } = NormalizedUri::of(req);
        let headers = req.headers();

        Self {
            timestamp,
            duration: Duration::ZERO,
            method: req.method().clone(),
            version: req.version(),
            uri,
            path,
            host: host(req),
            status: StatusCode::OK,
            size: 0,
            referer: header_str(headers, &REFERER),
            forwarded_for: header_str(headers, &FORWARDED_FOR_HEADER),
            user_agent: header_str(headers, &USER_AGENT),
            remote_addr: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    /// Protocol as written on the request line, e.g. `HTTP/1.1`.
    pub fn protocol(&self) -> &'static str {
        match self.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/?",
        }
    }

    /// Duration in seconds, computed as whole nanoseconds over 1e9.
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_nanos() as f64 / NANOS_PER_SEC
    }

    /// Duration in milliseconds, computed as whole nanoseconds over 1e6.
    pub fn duration_millis(&self) -> f64 {
        self.duration.as_nanos() as f64 / 1_000_000.0
    }

    /// Peer IP address, if known.
    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.remote_addr.map(|addr| addr.ip())
    }
}

/// Host header, or the authority of an absolute target (HTTP/2).
fn host<B>(req: &Request<B>) -> String {
    if let Some(host) = req.headers().get(HOST).and_then(|v| v.to_str().ok()) {
        return host.to_string();
    }

    req.uri()
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_default()
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
