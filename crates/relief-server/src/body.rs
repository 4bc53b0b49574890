//! Body prefix capture with replay
//!
//! Layers that need to look at a body without changing what downstream sees
//! read a bounded prefix with [`read_prefix`] and rebuild an equivalent body
//! from the prefix plus the unread remainder with [`Prefix::into_body`].

use axum::body::{Body, Bytes};
use futures::stream::{self, StreamExt};
use http_body_util::BodyExt;

/// How prefix collection ended
#[derive(Debug)]
pub enum PrefixEnd {
    /// The whole body fit under the limit
    Complete,
    /// The limit was crossed; the remainder is still unread
    Overflow(Body),
    /// The body failed after the collected bytes
    Failed(axum::Error),
}

/// Bytes collected from the front of a body
#[derive(Debug)]
pub struct Prefix {
    chunks: Vec<Bytes>,
    len: usize,
    end: PrefixEnd,
}

/// Read data frames until the body ends, fails, or more than `limit` bytes
/// have been collected
///
/// The chunk that crosses the limit is kept whole, so the prefix may be
/// longer than `limit` by at most one chunk. Trailers are dropped.
pub async fn read_prefix(mut body: Body, limit: usize) -> Prefix {
    let mut chunks = Vec::new();
    let mut len = 0usize;

    loop {
        match body.frame().await {
            None => {
                return Prefix {
                    chunks,
                    len,
                    end: PrefixEnd::Complete,
                }
            },
            Some(Err(e)) => {
                return Prefix {
                    chunks,
                    len,
                    end: PrefixEnd::Failed(e),
                }
            },
            Some(Ok(frame)) => {
                let Ok(data) = frame.into_data() else {
                    continue;
                };
                if data.is_empty() {
                    continue;
                }
                len += data.len();
                chunks.push(data);
                if len > limit {
                    return Prefix {
                        chunks,
                        len,
                        end: PrefixEnd::Overflow(body),
                    };
                }
            },
        }
    }
}

impl Prefix {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.end, PrefixEnd::Complete)
    }

    pub fn end(&self) -> &PrefixEnd {
        &self.end
    }

    /// Contiguous copy of the collected bytes
    pub fn to_bytes(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            many => {
                let mut buf = Vec::with_capacity(self.len);
                for chunk in many {
                    buf.extend_from_slice(chunk);
                }
                Bytes::from(buf)
            },
        }
    }

    /// Collected bytes cut to at most `limit`
    pub fn head(&self, limit: usize) -> Bytes {
        let bytes = self.to_bytes();
        if bytes.len() > limit {
            bytes.slice(..limit)
        } else {
            bytes
        }
    }

    /// Rebuild a body that yields exactly what the original would have
    pub fn into_body(self) -> Body {
        let Prefix { chunks, end, .. } = self;
        match end {
            PrefixEnd::Complete => match chunks.len() {
                0 => Body::empty(),
                1 => Body::from(chunks.into_iter().next().unwrap_or_default()),
                _ => Body::from_stream(stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>))),
            },
            PrefixEnd::Overflow(rest) => Body::from_stream(
                stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>))
                    .chain(rest.into_data_stream()),
            ),
            PrefixEnd::Failed(error) => Body::from_stream(
                stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>))
                    .chain(stream::once(async move { Err(error) })),
            ),
        }
    }
}
