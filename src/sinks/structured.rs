//! Structured request logs (JSON or logfmt, depending on the subscriber).
//!
//! Each request becomes one info-level record:
//!
//! ```json
//! {
//!   "module": "request.handler",
//!   "tag": "request_handled",
//!   "http.method": "GET",
//!   "http.protocol": "HTTP/1.1",
//!   "http.uri": "/path?query=value",
//!   "http.path": "/path",
//!   "http.host": "example.com",
//!   "http.status": 200,
//!   "http.bytes": 512,
//!   "dur": 0.302,
//!   "ts": "1983-05-26T02:30:45.736Z",
//!   "http.ref": "",
//!   "http.user": "203.0.113.9",
//!   "message": "GET /path?query=value HTTP/1.1"
//! }
//! ```

use chrono::SecondsFormat;
use serde_json::{Map, Value, json};
use tracing::Level;

use crate::instrument::{LogSink, RequestLog};

/// Target used for request records emitted through `tracing`.
pub const REQUEST_LOG_TARGET: &str = "request_telemetry::request";

/// Fields attached to every record, e.g. the emitting component.
///
/// Request fields take precedence over context fields with the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContext {
    fields: Map<String, Value>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any previous value under `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Receiver of formatted records.
pub trait LogBackend: Send + Sync + 'static {
    fn emit(&self, level: Level, fields: &Map<String, Value>, message: &str);
}

/// Keys set from the request; everything else in a record is context.
pub const REQUEST_FIELDS: [&str; 12] = [
    "tag",
    "http.method",
    "http.protocol",
    "http.uri",
    "http.path",
    "http.host",
    "http.status",
    "http.bytes",
    "dur",
    "ts",
    "http.ref",
    "http.user",
];

/// Emits records as `tracing` events on [`REQUEST_LOG_TARGET`].
///
/// Request keys become event fields of their own (`http.status` stays a
/// number under a JSON formatter). Remaining context keys are attached as
/// one `context` value rendered as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBackend;

macro_rules! request_event {
    ($level:expr, $r:ident, $message:ident) => {
        tracing::event!(
            target: REQUEST_LOG_TARGET,
            $level,
            tag = $r.str("tag"),
            "http.method" = $r.str("http.method"),
            "http.protocol" = $r.str("http.protocol"),
            "http.uri" = $r.str("http.uri"),
            "http.path" = $r.str("http.path"),
            "http.host" = $r.str("http.host"),
            "http.status" = $r.u64("http.status"),
            "http.bytes" = $r.u64("http.bytes"),
            dur = $r.f64("dur"),
            ts = $r.str("ts"),
            "http.ref" = $r.str("http.ref"),
            "http.user" = $r.str("http.user"),
            context = %$r.context,
            "{}",
            $message
        )
    };
}

/// Typed view over a record's field map.
struct EventFields<'a> {
    fields: &'a Map<String, Value>,
    context: Value,
}

impl<'a> EventFields<'a> {
    fn new(fields: &'a Map<String, Value>) -> Self {
        let context = fields
            .iter()
            .filter(|(key, _)| !REQUEST_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            fields,
            context: Value::Object(context),
        }
    }

    fn str(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn u64(&self, key: &str) -> u64 {
        self.fields.get(key).and_then(Value::as_u64).unwrap_or_default()
    }

    fn f64(&self, key: &str) -> f64 {
        self.fields.get(key).and_then(Value::as_f64).unwrap_or_default()
    }
}

impl LogBackend for TracingBackend {
    fn emit(&self, level: Level, fields: &Map<String, Value>, message: &str) {
        let record = EventFields::new(fields);
        match level {
            Level::ERROR => request_event!(Level::ERROR, record, message),
            Level::WARN => request_event!(Level::WARN, record, message),
            Level::INFO => request_event!(Level::INFO, record, message),
            Level::DEBUG => request_event!(Level::DEBUG, record, message),
            _ => request_event!(Level::TRACE, record, message),
        }
    }
}

/// Sink writing one structured record per request.
pub struct StructuredSink<L = TracingBackend> {
    context: LogContext,
    backend: L,
}

impl StructuredSink<TracingBackend> {
    /// Log through `tracing` with the given ambient context.
    pub fn new(context: LogContext) -> Self {
        Self::with_backend(context, TracingBackend)
    }
}

impl Default for StructuredSink<TracingBackend> {
    /// Context `module = request.handler`.
    fn default() -> Self {
        Self::new(LogContext::new().with("module", "request.handler"))
    }
}

impl<L: LogBackend> StructuredSink<L> {
    pub fn with_backend(context: LogContext, backend: L) -> Self {
        Self { context, backend }
    }

    /// Context fields merged with the request fields.
    pub fn fields(&self, event: &RequestLog) -> Map<String, Value> {
        let mut fields = self.context.fields().clone();
        let request = json!({
            "tag": "request_handled",
            "http.method": event.method.as_str(),
            "http.protocol": event.protocol(),
            "http.uri": event.uri,
            "http.path": event.path,
            "http.host": event.host,
            "http.status": event.status.as_u16(),
            "http.bytes": event.size,
            "dur": event.duration_secs(),
            "ts": event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            "http.ref": event.referer,
            "http.user": event.forwarded_for,
        });
        if let Value::Object(request) = request {
            fields.extend(request);
        }
        fields
    }
}

/// `<method> <uri> <protocol>`
pub fn summary(event: &RequestLog) -> String {
    format!("{} {} {}", event.method, event.uri, event.protocol())
}

impl<L: LogBackend> LogSink for StructuredSink<L> {
    fn log(&self, event: &RequestLog) {
        self.backend
            .emit(Level::INFO, &self.fields(event), &summary(event));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};

    type Emitted = Arc<Mutex<Vec<(Level, Map<String, Value>, String)>>>;

    #[derive(Clone, Default)]
    struct CaptureBackend(Emitted);

    impl LogBackend for CaptureBackend {
        fn emit(&self, level: Level, fields: &Map<String, Value>, message: &str) {
            self.0
                .lock()
                .unwrap()
                .push((level, fields.clone(), message.to_string()));
        }
    }

    fn event() -> RequestLog {
        let req = Request::builder()
            .uri("http://example.com/path?query=value")
            .header("host", "example.com")
            .header("referer", "https://google.com/")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let ts = Utc
            .with_ymd_and_hms(1983, 5, 26, 2, 30, 45)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(736))
            .unwrap();
        let mut event = RequestLog::from_request(&req, ts);
        event.duration = Duration::from_millis(302);
        event.status = StatusCode::OK;
        event.size = 100;
        event
    }

    #[test]
    fn test_record_fields() {
        let backend = CaptureBackend::default();
        let sink = StructuredSink::with_backend(LogContext::new(), backend.clone());

        sink.log(&event());

        let emitted = backend.0.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        let (level, fields, message) = &emitted[0];
        assert_eq!(*level, Level::INFO);
        assert_eq!(message, "GET /path?query=value HTTP/1.1");
        assert_eq!(fields["tag"], "request_handled");
        assert_eq!(fields["http.method"], "GET");
        assert_eq!(fields["http.protocol"], "HTTP/1.1");
        assert_eq!(fields["http.uri"], "/path?query=value");
        assert_eq!(fields["http.path"], "/path");
        assert_eq!(fields["http.host"], "example.com");
        assert_eq!(fields["http.status"], 200);
        assert_eq!(fields["http.bytes"], 100);
        assert_eq!(fields["dur"], 0.302);
        assert_eq!(fields["ts"], "1983-05-26T02:30:45.736Z");
        assert_eq!(fields["http.ref"], "https://google.com/");
        assert_eq!(fields["http.user"], "203.0.113.9");
    }

    #[test]
    fn test_ts_keeps_only_needed_precision() {
        let sink = StructuredSink::with_backend(LogContext::new(), CaptureBackend::default());
        let mut event = event();

        event.timestamp = Utc.with_ymd_and_hms(1983, 5, 26, 2, 30, 45).unwrap();
        assert_eq!(sink.fields(&event)["ts"], "1983-05-26T02:30:45Z");

        event.timestamp = event
            .timestamp
            .checked_add_signed(chrono::Duration::nanoseconds(1_500))
            .unwrap();
        assert_eq!(sink.fields(&event)["ts"], "1983-05-26T02:30:45.000001500Z");
    }

    #[test]
    fn test_context_is_merged() {
        let backend = CaptureBackend::default();
        let context = LogContext::new()
            .with("module", "request.handler")
            .with("service", "orders");
        let sink = StructuredSink::with_backend(context, backend);

        let fields = sink.fields(&event());

        assert_eq!(fields["module"], "request.handler");
        assert_eq!(fields["service"], "orders");
    }

    #[test]
    fn test_request_fields_win_over_context() {
        let sink = StructuredSink::with_backend(
            LogContext::new().with("tag", "custom").with("http.status", 999),
            CaptureBackend::default(),
        );

        let fields = sink.fields(&event());

        assert_eq!(fields["tag"], "request_handled");
        assert_eq!(fields["http.status"], 200);
    }

    #[test]
    fn test_duration_is_reproducible() {
        let sink = StructuredSink::with_backend(LogContext::new(), CaptureBackend::default());
        let mut event = event();
        event.duration = Duration::from_nanos(1_234_567_891);

        let first = sink.fields(&event)["dur"].as_f64().unwrap();
        let second = sink.fields(&event)["dur"].as_f64().unwrap();

        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(first, 1_234_567_891_f64 / 1e9);
    }

    #[test]
    fn test_default_context() {
        let sink = StructuredSink::default();
        assert_eq!(sink.context.fields()["module"], "request.handler");
    }

    #[test]
    fn test_tracing_backend_does_not_panic() {
        StructuredSink::default().log(&event());
    }

    #[derive(Clone, Default)]
    struct JsonBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for JsonBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_subscriber_gets_typed_fields() {
        let buf = JsonBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            StructuredSink::new(LogContext::new().with("module", "request.handler"))
                .log(&event());
        });

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let line = output.lines().next().unwrap();
        let record: Value = serde_json::from_str(line).unwrap();

        assert_eq!(record["target"], REQUEST_LOG_TARGET);
        assert_eq!(record["message"], "GET /path?query=value HTTP/1.1");
        assert!(record["http.status"].is_u64());
        assert_eq!(record["http.status"], 200);
        assert_eq!(record["http.bytes"], 100);
        assert_eq!(record["http.method"], "GET");
        assert_eq!(record["http.uri"], "/path?query=value");
        assert_eq!(record["http.ref"], "https://google.com/");
        assert_eq!(record["dur"], 0.302);

        let context: Value = serde_json::from_str(record["context"].as_str().unwrap()).unwrap();
        assert_eq!(context, serde_json::json!({ "module": "request.handler" }));
    }

    #[test]
    fn test_context_excludes_request_keys() {
        let sink = StructuredSink::with_backend(
            LogContext::new().with("service", "orders").with("tag", "custom"),
            CaptureBackend::default(),
        );
        let fields = sink.fields(&event());

        let view = EventFields::new(&fields);

        assert_eq!(view.context, serde_json::json!({ "service": "orders" }));
        assert_eq!(view.str("tag"), "request_handled");
        assert_eq!(view.u64("http.status"), 200);
    }
}
