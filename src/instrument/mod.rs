//! Per-request instrumentation.
//!
//! [`RequestLogLayer`] times each request, captures the response status and
//! body size, and hands one [`RequestLog`] per request to a [`LogSink`].
//! Sinks live in [`crate::sinks`]; several can be combined with [`Fanout`].
//!
//! # Example
//!
//! ```rust,ignore
//! use request_telemetry::instrument::{Fanout, RequestLogLayer};
//! use request_telemetry::sinks::{StatsdSink, StructuredSink};
//!
//! let sinks = Fanout::new()
//!     .with(StructuredSink::default())
//!     .with(StatsdSink::new(statsd_client));
//!
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(RequestLogLayer::new(sinks));
//! ```

pub mod capture;
pub mod event;
pub mod layer;
pub mod uri;

use std::sync::Arc;

pub use capture::{CaptureBody, ResponseCapture};
pub use event::RequestLog;
pub use layer::{RequestLogLayer, RequestLogService};
pub use uri::NormalizedUri;

/// Destination for completed request records.
///
/// Called once per request from whichever task finishes the response.
/// Implementations must not block for long and must swallow their own
/// delivery failures.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, event: &RequestLog);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn log(&self, event: &RequestLog) {
        (**self).log(event);
    }
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn log(&self, event: &RequestLog) {
        (**self).log(event);
    }
}

/// Sends every record to each of its sinks, in insertion order.
#[derive(Clone, Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl LogSink) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn push(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl LogSink for Fanout {
    fn log(&self, event: &RequestLog) {
        for sink in &self.sinks {
            sink.log(event);
        }
    }
}
