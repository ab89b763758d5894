//! Prometheus request metrics via the `metrics` facade.

use crate::instrument::{LogSink, RequestLog};
use crate::metrics::record_request;

/// Sink recording request count and duration histograms.
///
/// Labelled by path (never the full uri), method and status.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusSink;

impl LogSink for PrometheusSink {
    fn log(&self, event: &RequestLog) {
        record_request(
            &event.path,
            event.method.as_str(),
            event.status.as_u16(),
            event.duration_secs(),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;

    #[test]
    fn test_log_without_recorder() {
        let req = Request::builder().uri("/x?y=1").body(Body::empty()).unwrap();
        PrometheusSink.log(&RequestLog::from_request(&req, Utc::now()));
    }
}
