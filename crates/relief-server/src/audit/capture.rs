//! Response body tee
//!
//! [`TeeBody`] forwards every frame of the wrapped body unchanged while
//! keeping a bounded copy of the data. When the body ends, fails, or is
//! dropped before completion, the completion callback runs exactly once with
//! the captured bytes and the failure text, if any.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Body as _, Frame, SizeHint};

/// Called once with the captured bytes and an error description
pub type OnComplete = Box<dyn FnOnce(Bytes, Option<String>) + Send + 'static>;

pub struct TeeBody {
    inner: Body,
    captured: Vec<u8>,
    limit: usize,
    on_complete: Option<OnComplete>,
}

impl TeeBody {
    /// Capture up to `limit` bytes; `limit == 0` forwards without copying
    pub fn new(inner: Body, limit: usize, on_complete: OnComplete) -> Self {
        Self {
            inner,
            captured: Vec::new(),
            limit,
            on_complete: Some(on_complete),
        }
    }

    fn capture(&mut self, data: &Bytes) {
        let room = self.limit.saturating_sub(self.captured.len());
        if room > 0 {
            let take = room.min(data.len());
            self.captured.extend_from_slice(&data[..take]);
        }
    }

    fn complete(&mut self, error: Option<String>) {
        if let Some(on_complete) = self.on_complete.take() {
            let captured = Bytes::from(std::mem::take(&mut self.captured));
            on_complete(captured, error);
        }
    }
}

impl http_body::Body for TeeBody {
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
                    this.capture(data);
                }
            },
            Poll::Ready(Some(Err(e))) => this.complete(Some(format!("response body: {e}"))),
            Poll::Ready(None) => this.complete(None),
            Poll::Pending => {},
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

impl Drop for TeeBody {
    fn drop(&mut self) {
        let error = if self.inner.is_end_stream() {
            None
        } else {
            Some("response body: dropped before completion".to_string())
        };
        self.complete(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Bytes, Option<String>)>>>;

    fn recorder() -> (Seen, OnComplete) {
        let seen: Seen = Arc::default();
        let sink = Arc::clone(&seen);
        let on_complete: OnComplete = Box::new(move |bytes, error| {
            sink.lock().unwrap().push((bytes, error));
        });
        (seen, on_complete)
    }

    #[tokio::test]
    async fn test_forwards_and_captures() {
        let (seen, on_complete) = recorder();
        let body = Body::from_stream(stream::iter(vec![
            Ok::<_, axum::Error>(Bytes::from_static(b"[{\"id\":")),
            Ok(Bytes::from_static(b"\"a\"}]")),
        ]));

        let out = Body::new(TeeBody::new(body, 1024, on_complete))
            .collect()
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&out[..], b"[{\"id\":\"a\"}]");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(&seen[0].0[..], b"[{\"id\":\"a\"}]");
        assert_eq!(seen[0].1, None);
    }

    #[tokio::test]
    async fn test_capture_is_bounded() {
        let (seen, on_complete) = recorder();
        let payload = vec![b'x'; 100];
        let out = Body::new(TeeBody::new(Body::from(payload.clone()), 10, on_complete))
            .collect()
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(out.len(), 100);
        assert_eq!(seen.lock().unwrap()[0].0.len(), 10);
    }

    #[tokio::test]
    async fn test_error_reported_once() {
        let (seen, on_complete) = recorder();
        let body = Body::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(axum::Error::new(std::io::Error::other("reset"))),
        ]));

        let result = Body::new(TeeBody::new(body, 1024, on_complete)).collect().await;
        assert!(result.is_err());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(&seen[0].0[..], b"partial");
        assert!(seen[0].1.as_deref().unwrap().contains("reset"));
    }

    #[tokio::test]
    async fn test_drop_without_polling() {
        let (seen, on_complete) = recorder();
        drop(TeeBody::new(Body::empty(), 1024, on_complete));
        assert_eq!(seen.lock().unwrap()[0].1, None);

        let (seen, on_complete) = recorder();
        let pending = Body::from_stream(stream::pending::<Result<Bytes, axum::Error>>());
        drop(TeeBody::new(pending, 1024, on_complete));
        assert!(seen.lock().unwrap()[0].1.is_some());
    }
}
