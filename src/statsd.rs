//! DogStatsD client over UDP.
//!
//! Metrics are rendered as DogStatsD lines and sent one per datagram:
//!
//! ```text
//! <namespace><name>:<value>|<type>|#<tag>,<tag>,...
//! ```
//!
//! Delivery is best effort. The socket is non-blocking; a full send buffer,
//! an unreachable agent, or any other send error drops the metric with a
//! debug log. Nothing is retried and nothing is reported to the caller.

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::debug;

use crate::error::{AppError, AppResult};

/// Value and type of a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Duration in milliseconds (`ms`), rendered with 6 decimals.
    TimingMs(f64),
    /// Counter increment (`c`).
    Count(i64),
}

impl MetricValue {
    /// DogStatsD type suffix.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricValue::TimingMs(_) => "ms",
            MetricValue::Count(_) => "c",
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::TimingMs(ms) => write!(f, "{ms:.6}"),
            MetricValue::Count(n) => write!(f, "{n}"),
        }
    }
}

/// A single metric with its tags, before namespacing.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
    pub tags: Vec<String>,
}

impl Metric {
    pub fn timing_ms(name: impl Into<String>, ms: f64, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::TimingMs(ms),
            tags,
        }
    }

    pub fn count(name: impl Into<String>, n: i64, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Count(n),
            tags,
        }
    }
}

/// Fire-and-forget metric delivery.
pub trait MetricsTransport: Send + Sync + 'static {
    fn send(&self, metric: &Metric);
}

/// UDP DogStatsD client with a namespace prefix and static tags.
#[derive(Debug)]
pub struct StatsdClient {
    socket: UdpSocket,
    namespace: String,
    tags: Vec<String>,
}

impl StatsdClient {
    /// Create a client sending to `addr` (e.g. `127.0.0.1:8125`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `addr` does not resolve, and
    /// `AppError::Io` if the local socket cannot be set up.
    pub fn new(addr: impl ToSocketAddrs) -> AppResult<Self> {
        let target = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| AppError::ConfigError("statsd address did not resolve".to_string()))?;

        let socket = UdpSocket::bind(local_addr_for(&target))?;
        socket.connect(target)?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            namespace: String::new(),
            tags: Vec::new(),
        })
    }

    /// Prefix every metric name with `namespace` (include the trailing dot).
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Tags added in front of every metric's own tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Render `metric` as a DogStatsD line.
    pub fn format(&self, metric: &Metric) -> String {
        let mut line = format!(
            "{}{}:{}|{}",
            self.namespace,
            metric.name,
            metric.value,
            metric.value.kind()
        );

        let mut tags = self.tags.iter().chain(metric.tags.iter()).peekable();
        if tags.peek().is_some() {
            line.push_str("|#");
            line.push_str(&tags.map(String::as_str).collect::<Vec<_>>().join(","));
        }

        line
    }

    fn send_line(&self, line: &str) -> io::Result<()> {
        self.socket.send(line.as_bytes()).map(|_| ())
    }
}

impl MetricsTransport for StatsdClient {
    fn send(&self, metric: &Metric) {
        let line = self.format(metric);
        if let Err(e) = self.send_line(&line) {
            debug!(error = %e, metric = %metric.name, "Dropped statsd metric");
        }
    }
}

fn local_addr_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> StatsdClient {
        StatsdClient::new("127.0.0.1:8125").unwrap()
    }

    #[test]
    fn test_format_timing() {
        let line = client().format(&Metric::timing_ms("latency", 12.5, vec![]));
        assert_eq!(line, "latency:12.500000|ms");
    }

    #[test]
    fn test_format_count_with_namespace_and_tags() {
        let client = client()
            .with_namespace("app.")
            .with_tags(["env:test"]);
        let line = client.format(&Metric::count("hits", 1, vec!["route:/".to_string()]));

        assert_eq!(line, "app.hits:1|c|#env:test,route:/");
    }

    #[test]
    fn test_format_static_tags_only() {
        let client = client().with_tags(["a", "b"]);
        let line = client.format(&Metric::count("hits", 3, vec![]));

        assert_eq!(line, "hits:3|c|#a,b");
    }

    #[test]
    fn test_send_delivers_datagram() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let client = StatsdClient::new(server.local_addr().unwrap())
            .unwrap()
            .with_namespace("svc.");

        client.send(&Metric::count("ping", 1, vec![]));

        let mut buf = [0u8; 512];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(std::str::from_utf8(&buf[..n]).unwrap(), "svc.ping:1|c");
    }

    #[test]
    fn test_send_to_closed_port_does_not_fail() {
        let port = {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket.local_addr().unwrap().port()
        };
        let client = StatsdClient::new(("127.0.0.1", port)).unwrap();

        client.send(&Metric::count("lost", 1, vec![]));
        client.send(&Metric::count("lost", 1, vec![]));
    }

    #[test]
    fn test_unresolvable_address() {
        let empty: Vec<SocketAddr> = Vec::new();
        let err = StatsdClient::new(empty.as_slice()).unwrap_err();
        assert!(err.to_string().contains("statsd address"));
    }
}
