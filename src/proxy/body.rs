//! Streaming response body.
//!
//! Forwards the backend's body frame by frame, so a response is never held in
//! memory as a whole, and records how the copy ended.

use crate::proxy::{BoxError, RelayOutcome};
use crate::util::RequestId;
use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::time::Sleep;
use tracing::{info, warn};

/// The body was not fully written before its deadline.
#[derive(Debug, thiserror::Error)]
#[error("response body not completed before the deadline")]
pub struct DeadlineExceeded;

pin_project! {
    /// Body adapter between the backend response and the client.
    ///
    /// Ends with `Succeeded` when the backend body is exhausted, or
    /// `CopyFailed` when the backend errors, the deadline passes, or the
    /// client goes away first. Headers are already sent by then, so a
    /// failure can only be logged.
    pub struct StreamingBody<B> {
        #[pin]
        inner: B,
        #[pin]
        deadline: Option<Sleep>,
        backend: String,
        request_id: RequestId,
        status: u16,
        started: Instant,
        bytes: u64,
        done: bool,
    }

    impl<B> PinnedDrop for StreamingBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if !*this.done {
                warn!(
                    request_id = %this.request_id,
                    backend = %this.backend,
                    status = *this.status,
                    bytes = *this.bytes,
                    outcome = %RelayOutcome::CopyFailed,
                    "client went away before the response body was written"
                );
            }
        }
    }
}

impl<B> StreamingBody<B>
where
    B: Body<Data = Bytes>,
{
    /// Wrap a backend body.
    ///
    /// # Arguments
    ///
    /// * `inner` - The backend's response body
    /// * `deadline` - Instant by which the whole body must be written
    /// * `backend` - Backend URL, for logging
    /// * `request_id` - Request ID, for logging
    /// * `status` - Status code already sent to the client
    /// * `started` - When the request was received
    pub fn new(
        inner: B,
        deadline: Option<tokio::time::Instant>,
        backend: impl Into<String>,
        request_id: RequestId,
        status: u16,
        started: Instant,
    ) -> Self {
        let body = Self {
            done: inner.is_end_stream(),
            inner,
            deadline: deadline.map(tokio::time::sleep_until),
            backend: backend.into(),
            request_id,
            status,
            started,
            bytes: 0,
        };

        // Empty bodies (HEAD, 204, 304) may never be polled.
        if body.done {
            body.log_success();
        }

        body
    }

    fn log_success(&self) {
        info!(
            request_id = %self.request_id,
            backend = %self.backend,
            status = self.status,
            bytes = self.bytes,
            duration_ms = self.started.elapsed().as_millis(),
            outcome = %RelayOutcome::Succeeded,
            "request completed"
        );
    }
}

impl<B> Body for StreamingBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        if *this.done {
            return Poll::Ready(None);
        }

        if let Some(deadline) = this.deadline.as_mut().as_pin_mut() {
            if deadline.poll(cx).is_ready() {
                *this.done = true;
                warn!(
                    request_id = %this.request_id,
                    backend = %this.backend,
                    status = *this.status,
                    bytes = *this.bytes,
                    outcome = %RelayOutcome::CopyFailed,
                    "response body deadline exceeded"
                );
                return Poll::Ready(Some(Err(Box::new(DeadlineExceeded))));
            }
        }

        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    *this.bytes += data.len() as u64;
                }
                // A sized body may be dropped as soon as its last byte is
                // written, without another poll.
                if this.inner.is_end_stream() {
                    *this.done = true;
                    info!(
                        request_id = %this.request_id,
                        backend = %this.backend,
                        status = *this.status,
                        bytes = *this.bytes,
                        duration_ms = this.started.elapsed().as_millis(),
                        outcome = %RelayOutcome::Succeeded,
                        "request completed"
                    );
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                *this.done = true;
                let e: BoxError = e.into();
                warn!(
                    request_id = %this.request_id,
                    backend = %this.backend,
                    status = *this.status,
                    bytes = *this.bytes,
                    error = %e,
                    outcome = %RelayOutcome::CopyFailed,
                    "failed to copy response body"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                *this.done = true;
                info!(
                    request_id = %this.request_id,
                    backend = %this.backend,
                    status = *this.status,
                    bytes = *this.bytes,
                    duration_ms = this.started.elapsed().as_millis(),
                    outcome = %RelayOutcome::Succeeded,
                    "request completed"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Full, StreamBody};
    use std::convert::Infallible;
    use std::time::Duration;

    fn wrap<B: Body<Data = Bytes>>(
        inner: B,
        deadline: Option<tokio::time::Instant>,
    ) -> StreamingBody<B> {
        StreamingBody::new(
            inner,
            deadline,
            "http://127.0.0.1:9000",
            RequestId::from_string("test"),
            200,
            Instant::now(),
        )
    }

    #[tokio::test]
    async fn test_body_passes_through() {
        let body = wrap(Full::new(Bytes::from_static(b"hello world")), None);
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"hello world");
    }

    #[tokio::test]
    async fn test_multiple_frames_in_order() {
        let frames = futures::stream::iter(vec![
            Ok::<_, Infallible>(Frame::data(Bytes::from_static(b"one,"))),
            Ok(Frame::data(Bytes::from_static(b"two,"))),
            Ok(Frame::data(Bytes::from_static(b"three"))),
        ]);
        let body = wrap(StreamBody::new(frames), None);

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"one,two,three");
    }

    #[tokio::test]
    async fn test_sized_body_ends_with_last_frame() {
        let mut body = Box::pin(wrap(Full::new(Bytes::from_static(b"hello")), None));
        assert!(!body.is_end_stream());

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"hello"));
        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_body_is_done_immediately() {
        let body = wrap(http_body_util::Empty::<Bytes>::new(), None);
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_inner_error_is_propagated() {
        let frames = futures::stream::iter(vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(std::io::Error::other("backend reset")),
        ]);
        let body = wrap(StreamBody::new(frames), None);

        let result = body.collect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let stalled = StreamBody::new(futures::stream::pending::<
            Result<Frame<Bytes>, Infallible>,
        >());
        let deadline = tokio::time::Instant::now() + Duration::from_millis(50);
        let body = wrap(stalled, Some(deadline));

        let result = tokio::time::timeout(Duration::from_secs(2), body.collect())
            .await
            .expect("deadline should end the body");
        let err = result.unwrap_err();
        assert!(err.is::<DeadlineExceeded>());
    }
}
