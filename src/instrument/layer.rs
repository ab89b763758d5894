//! Request instrumentation layer.
//!
//! Wraps any service and reports every request to a [`LogSink`] exactly once,
//! after the response body has been sent.
//!
//! ```text
//! request ─► RequestLog::from_request ─► inner service ─► response head
//!                                                             │
//!                                      CaptureBody ◄──────────┘
//!                                           │ end of stream / drop
//!                                           ▼
//!                                     sink.log(&RequestLog)
//! ```
//!
//! Request fields are taken before the inner service runs, so later changes
//! made by inner layers (path rewrites, extensions) never leak into the log.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use chrono::Utc;
use tower::{Layer, Service};
use tracing::debug;

use super::LogSink;
use super::capture::{CaptureBody, ResponseCapture};
use super::event::RequestLog;

/// Layer producing [`RequestLogService`].
#[derive(Clone)]
pub struct RequestLogLayer {
    sink: Arc<dyn LogSink>,
}

impl RequestLogLayer {
    /// Report requests to `sink`.
    pub fn new(sink: impl LogSink) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Report requests to an already shared sink.
    pub fn from_shared(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            sink: self.sink.clone(),
        }
    }
}

/// Service wrapper timing requests and capturing response status and size.
#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    sink: Arc<dyn LogSink>,
}

impl<S> Service<Request<Body>> for RequestLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let pending = PendingLog {
            sink: self.sink.clone(),
            started: Instant::now(),
            event: Some(RequestLog::from_request(&req, Utc::now())),
        };

        // The clone may not be ready; the ready one goes into the future.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(req).await?;

            let (parts, body) = response.into_parts();
            let mut capture = ResponseCapture::new();
            capture.write_header(parts.status);

            let body = CaptureBody::new(body, capture, move |capture| pending.complete(capture));
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

/// A request that has started but not yet been reported.
///
/// Dropping it unreported (inner error, panic, cancelled future) still
/// reports the request, as a `500` with no body.
struct PendingLog {
    sink: Arc<dyn LogSink>,
    started: Instant,
    event: Option<RequestLog>,
}

impl PendingLog {
    fn complete(mut self, capture: ResponseCapture) {
        self.report(capture.status(), capture.size());
    }

    fn report(&mut self, status: StatusCode, size: u64) {
        if let Some(mut event) = self.event.take() {
            event.duration = self.started.elapsed();
            event.status = status;
            event.size = size;
            self.sink.log(&event);
        }
    }
}

impl Drop for PendingLog {
    fn drop(&mut self) {
        if self.event.is_some() {
            debug!("Request ended without a response, reporting as 500");
            self.report(StatusCode::INTERNAL_SERVER_ERROR, 0);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::http::Method;
    use tower::ServiceExt;
    use tower::service_fn;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<RequestLog>>>);

    impl LogSink for Recorder {
        fn log(&self, event: &RequestLog) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn events(&self) -> Vec<RequestLog> {
            self.0.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_reports_status_size_and_uri() {
        let recorder = Recorder::default();
        let service = RequestLogLayer::new(recorder.clone()).layer(service_fn(
            |_req: Request<Body>| async {
                Ok::<_, Infallible>(
                    Response::builder()
                        .status(StatusCode::CREATED)
                        .body(Body::from("created!"))
                        .unwrap(),
                )
            },
        ));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/items?draft=true")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"created!");

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, StatusCode::CREATED);
        assert_eq!(events[0].size, 8);
        assert_eq!(events[0].uri, "/items?draft=true");
        assert_eq!(events[0].path, "/items");
        assert_eq!(events[0].method, Method::POST);
    }

    #[tokio::test]
    async fn test_not_reported_until_body_finishes() {
        let recorder = Recorder::default();
        let service = RequestLogLayer::new(recorder.clone()).layer(service_fn(
            |_req: Request<Body>| async { Ok::<_, Infallible>(Response::new(Body::from("abc"))) },
        ));

        let response = service
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(recorder.events().is_empty());

        drop(response);
        assert_eq!(recorder.events().len(), 1);
    }

    #[tokio::test]
    async fn test_uses_original_request_target() {
        let recorder = Recorder::default();
        let service = RequestLogLayer::new(recorder.clone()).layer(service_fn(
            |mut req: Request<Body>| async move {
                *req.uri_mut() = "/rewritten".parse().unwrap();
                Ok::<_, Infallible>(Response::new(Body::empty()))
            },
        ));

        let response = service
            .oneshot(Request::builder().uri("/original").body(Body::empty()).unwrap())
            .await
            .unwrap();
        drop(response);

        assert_eq!(recorder.events()[0].path, "/original");
    }

    #[tokio::test]
    async fn test_inner_error_reports_500() {
        let recorder = Recorder::default();
        let service = RequestLogLayer::new(recorder.clone()).layer(service_fn(
            |_req: Request<Body>| async { Err::<Response<Body>, _>("boom") },
        ));

        let result = service
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await;
        assert!(result.is_err());

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(events[0].size, 0);
    }

    #[tokio::test]
    async fn test_duration_covers_handler() {
        let recorder = Recorder::default();
        let service = RequestLogLayer::new(recorder.clone()).layer(service_fn(
            |_req: Request<Body>| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, Infallible>(Response::new(Body::empty()))
            },
        ));

        let response = service
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        drop(response);

        assert!(recorder.events()[0].duration >= Duration::from_millis(20));
    }
}
