//! Conditional GET layer
//!
//! Successful GET responses are buffered up to a ceiling, fingerprinted and
//! answered with `304 Not Modified` when the client already holds the same
//! representation. Bodies larger than the ceiling switch to streaming and
//! are forwarded untouched apart from a best-effort `Cache-Control`.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::Response,
};
use chrono::Utc;
use tower::{Layer, Service};
use tracing::debug;

use super::policy::{fingerprint, if_none_match_contains, CachePolicy};
use crate::body::{read_prefix, PrefixEnd};

/// Whether the interceptor still holds the whole body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Buffering,
    Streaming,
}

/// Per-request outcome, also attached to the response as an extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDecision {
    pub fingerprint: Option<String>,
    pub cache_control: String,
    pub mode: CacheMode,
}

#[derive(Clone)]
pub struct ConditionalCacheLayer {
    policy: CachePolicy,
    max_body_bytes: usize,
}

impl ConditionalCacheLayer {
    pub fn new(policy: CachePolicy, max_body_bytes: usize) -> Self {
        Self {
            policy,
            max_body_bytes,
        }
    }
}

impl<S> Layer<S> for ConditionalCacheLayer {
    type Service = ConditionalCacheMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConditionalCacheMiddleware {
            inner,
            policy: self.policy.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[derive(Clone)]
pub struct ConditionalCacheMiddleware<S> {
    inner: S,
    policy: CachePolicy,
    max_body_bytes: usize,
}

impl<S> Service<Request> for ConditionalCacheMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let policy = self.policy.clone();
        let max_body_bytes = self.max_body_bytes;

        Box::pin(async move {
            if request.method() != Method::GET {
                return inner.call(request).await;
            }

            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| request.uri().path().to_string());
            let query = request.uri().query().map(str::to_string);
            let if_none_match: Vec<String> = request
                .headers()
                .get_all(header::IF_NONE_MATCH)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::to_string)
                .collect();

            let response = inner.call(request).await?;
            if response.status() != StatusCode::OK {
                return Ok(response);
            }

            let directive = policy.directive(&route, query.as_deref());
            Ok(finish(response, directive, &if_none_match, max_body_bytes).await)
        })
    }
}

async fn finish(
    response: Response,
    directive: String,
    if_none_match: &[String],
    max_body_bytes: usize,
) -> Response {
    let (mut parts, body) = response.into_parts();
    let prefix = read_prefix(body, max_body_bytes).await;

    match prefix.end() {
        PrefixEnd::Complete => {},
        PrefixEnd::Overflow(_) => {
            let cache_control = set_if_absent(&mut parts.headers, header::CACHE_CONTROL, &directive);
            debug!(buffered = prefix.len(), "Response exceeds cache ceiling, streaming");
            parts.extensions.insert(CacheDecision {
                fingerprint: None,
                cache_control,
                mode: CacheMode::Streaming,
            });
            return Response::from_parts(parts, prefix.into_body());
        },
        PrefixEnd::Failed(e) => {
            debug!(error = %e, buffered = prefix.len(), "Response body failed, serving uncached");
            return Response::from_parts(parts, prefix.into_body());
        },
    }

    let bytes = prefix.to_bytes();
    let etag = fingerprint(&bytes);

    parts.headers.insert(
        header::ETAG,
        HeaderValue::from_str(&etag).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    let cache_control = set_if_absent(&mut parts.headers, header::CACHE_CONTROL, &directive);
    add_vary_accept_encoding(&mut parts.headers);
    if !parts.headers.contains_key(header::LAST_MODIFIED) {
        let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(value) = HeaderValue::from_str(&now) {
            parts.headers.insert(header::LAST_MODIFIED, value);
        }
    }

    let not_modified = if_none_match
        .iter()
        .any(|value| if_none_match_contains(value, &etag));

    parts.extensions.insert(CacheDecision {
        fingerprint: Some(etag),
        cache_control,
        mode: CacheMode::Buffering,
    });

    if not_modified {
        parts.status = StatusCode::NOT_MODIFIED;
        parts.headers.remove(header::CONTENT_LENGTH);
        return Response::from_parts(parts, Body::empty());
    }

    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    Response::from_parts(parts, Body::from(bytes))
}

/// Keep a handler-provided value, otherwise install `value`; returns the effective value
fn set_if_absent(headers: &mut HeaderMap, name: header::HeaderName, value: &str) -> String {
    if let Some(existing) = headers.get(&name).and_then(|v| v.to_str().ok()) {
        return existing.to_string();
    }
    if let Ok(v) = HeaderValue::from_str(value) {
        headers.insert(name, v);
    }
    value.to_string()
}

fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    let present = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| v.trim().eq_ignore_ascii_case("accept-encoding"));
    if !present {
        headers.append(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use futures::stream;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(max_body_bytes: usize) -> Router {
        Router::new()
            .route("/supply_items/:id", get(|| async { Json(json!({"id": "a", "received_count": 3})) }))
            .route("/supplies/:id/progress", get(|| async { Json(json!({"completed_items": 1})) }))
            .route(
                "/pinned",
                get(|| async {
                    (
                        [
                            (header::CACHE_CONTROL, "private, max-age=5"),
                            (header::LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT"),
                        ],
                        "pinned",
                    )
                }),
            )
            .route(
                "/big",
                get(|| async {
                    let chunks = (0..8).map(|i| Ok::<_, std::io::Error>(vec![b'a' + i as u8; 1024]));
                    Body::from_stream(stream::iter(chunks.collect::<Vec<_>>()))
                }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND.into_response() }))
            .route("/echo", post(|| async { "posted" }))
            .layer(ConditionalCacheLayer::new(CachePolicy::default(), max_body_bytes))
    }

    fn get_req(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_etag_and_not_modified() {
        let app = app(512 * 1024);

        let first = app.clone().oneshot(get_req("/supply_items/abc")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let etag = first.headers()[header::ETAG].to_str().unwrap().to_string();
        assert!(etag.starts_with("W/\""));
        assert_eq!(first.headers()[header::CACHE_CONTROL], "public, max-age=60");
        assert_eq!(first.headers()[header::VARY], "Accept-Encoding");
        assert!(first.headers().contains_key(header::LAST_MODIFIED));
        let body = first.into_body().collect().await.unwrap().to_bytes();

        let second = app.clone().oneshot(get_req("/supply_items/abc")).await.unwrap();
        assert_eq!(second.headers()[header::ETAG], etag.as_str());
        assert_eq!(
            second.headers()[header::CONTENT_LENGTH],
            body.len().to_string().as_str()
        );

        let conditional = Request::builder()
            .uri("/supply_items/abc")
            .header(header::IF_NONE_MATCH, format!("W/\"deadbeefdeadbeef\", {}", etag))
            .body(Body::empty())
            .unwrap();
        let cached = app.oneshot(conditional).await.unwrap();
        assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(cached.headers()[header::ETAG], etag.as_str());
        assert_eq!(cached.headers()[header::CACHE_CONTROL], "public, max-age=60");
        assert!(!cached.headers().contains_key(header::CONTENT_LENGTH));
        assert!(cached.into_body().collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_handler_headers_preserved() {
        let response = app(1024).oneshot(get_req("/pinned")).await.unwrap();
        assert_eq!(response.headers()[header::CACHE_CONTROL], "private, max-age=5");
        assert_eq!(
            response.headers()[header::LAST_MODIFIED],
            "Wed, 21 Oct 2015 07:28:00 GMT"
        );
        let decision = response.extensions().get::<CacheDecision>().unwrap();
        assert_eq!(decision.cache_control, "private, max-age=5");
    }

    #[tokio::test]
    async fn test_realtime_route_no_cache() {
        let response = app(1024).oneshot(get_req("/supplies/xyz/progress")).await.unwrap();
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert!(response.headers().contains_key(header::ETAG));
    }

    #[tokio::test]
    async fn test_oversized_body_streams_without_etag() {
        let response = app(3000).oneshot(get_req("/big")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(header::ETAG));
        assert!(!response.headers().contains_key(header::CONTENT_LENGTH));
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=30");
        assert_eq!(
            response.extensions().get::<CacheDecision>().map(|d| d.mode),
            Some(CacheMode::Streaming)
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let expected: Vec<u8> = (0..8u8).flat_map(|i| vec![b'a' + i; 1024]).collect();
        assert_eq!(body.as_ref(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_non_ok_and_non_get_untouched() {
        let app = app(1024);
        let missing = app.clone().oneshot(get_req("/missing")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(!missing.headers().contains_key(header::ETAG));

        let posted = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(!posted.headers().contains_key(header::ETAG));
        assert!(!posted.headers().contains_key(header::CACHE_CONTROL));
    }

    #[tokio::test]
    async fn test_failed_body_served_without_conditional_headers() {
        let app = Router::new()
            .route(
                "/flaky",
                get(|| async {
                    Body::from_stream(stream::iter(vec![
                        Ok(axum::body::Bytes::from_static(b"partial")),
                        Err(std::io::Error::new(std::io::ErrorKind::Other, "upstream reset")),
                    ]))
                }),
            )
            .layer(ConditionalCacheLayer::new(CachePolicy::default(), 1024));

        let response = app.oneshot(get_req("/flaky")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(header::ETAG));
        assert!(response.into_body().collect().await.is_err());
    }
}
