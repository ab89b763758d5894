//! Statsd request metrics.
//!
//! Two metrics per request, both tagged with endpoint, status and method:
//!
//! - `request.response_time` - timing in milliseconds
//! - `request.count` - counter, always 1
//!
//! The endpoint tag is the path without query string so the number of
//! distinct tag values stays bounded.

use crate::instrument::{LogSink, RequestLog};
use crate::statsd::{Metric, MetricsTransport};

pub const RESPONSE_TIME_METRIC: &str = "request.response_time";
pub const REQUEST_COUNT_METRIC: &str = "request.count";

/// Sink sending request timings and counts to a statsd transport.
pub struct StatsdSink<T> {
    transport: T,
}

impl<T: MetricsTransport> StatsdSink<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

/// The two metrics reported for `event`.
pub fn request_metrics(event: &RequestLog) -> [Metric; 2] {
    let tags = vec![
        format!("endpoint:{}", event.path),
        format!("statusCode:{}", event.status.as_u16()),
        format!("method:{}", event.method),
    ];

    [
        Metric::timing_ms(RESPONSE_TIME_METRIC, event.duration_millis(), tags.clone()),
        Metric::count(REQUEST_COUNT_METRIC, 1, tags),
    ]
}

impl<T: MetricsTransport> LogSink for StatsdSink<T> {
    fn log(&self, event: &RequestLog) {
        for metric in request_metrics(event) {
            self.transport.send(&metric);
        }
    }
}
