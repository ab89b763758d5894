//! Response capture: status code and byte count of an in-flight response.
//!
//! [`ResponseCapture`] follows the usual server semantics: the first status
//! written wins, and writing body bytes before any status implies `200 OK`.
//!
//! [`CaptureBody`] decorates a response body. Frames are forwarded as soon as
//! the inner body yields them; the decorator only counts data bytes. Once the
//! stream ends, fails, or the body is dropped (client went away), the final
//! capture is handed to a completion callback exactly once.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::StatusCode;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};

/// Status and size observed for one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseCapture {
    status: Option<StatusCode>,
    size: u64,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the response status. Later calls are ignored.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    /// Record `len` body bytes written to the client.
    pub fn write(&mut self, len: usize) {
        self.write_header(StatusCode::OK);
        self.size = self.size.saturating_add(len as u64);
    }

    /// Status written so far, `200 OK` if none was.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Total body bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Response body decorator feeding a [`ResponseCapture`].
pub struct CaptureBody<F>
where
    F: FnOnce(ResponseCapture),
{
    inner: Body,
    capture: ResponseCapture,
    on_complete: Option<F>,
}

impl<F> CaptureBody<F>
where
    F: FnOnce(ResponseCapture),
{
    pub fn new(inner: Body, capture: ResponseCapture, on_complete: F) -> Self {
        Self {
            inner,
            capture,
            on_complete: Some(on_complete),
        }
    }

    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(self.capture);
        }
    }
}

impl<F> HttpBody for CaptureBody<F>
where
    F: FnOnce(ResponseCapture) + Unpin,
{
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.write(data.len());
                }
                // The server may never poll again once the body reports its end.
                if this.inner.is_end_stream() {
                    this.complete();
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.complete(),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<F> Drop for CaptureBody<F>
where
    F: FnOnce(ResponseCapture),
{
    fn drop(&mut self) {
        self.complete();
    }
}
