//! Request log middleware
//!
//! Every request is recorded, whatever its method or outcome. The record is
//! assembled in two halves: request facts before the handler runs, response
//! facts afterwards, and it is handed to the [`AuditSink`] once the response
//! body has been fully sent (or abandoned).

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http::Method,
    response::Response,
};
use sqlx::PgPool;
use tower::{Layer, Service};
use tracing::debug;

use super::capture::TeeBody;
use super::models::{header_snapshot, json_or_null, resource_id, NewRequestLog};
use super::preimage::PreimageReader;
use super::sink::AuditSink;
use crate::body::{read_prefix, PrefixEnd};
use crate::config::AuditConfig;
use crate::error::RecordedErrors;
use crate::middleware::client_ip::client_ip;

/// Request log layer
///
/// Must sit outside compression so captured bodies are plain bytes.
#[derive(Clone)]
pub struct AuditLayer {
    sink: AuditSink,
    preimages: PreimageReader,
    max_header_bytes: usize,
    max_body_bytes: usize,
}

impl AuditLayer {
    pub fn new(pool: PgPool, config: &AuditConfig) -> Self {
        Self {
            sink: AuditSink::new(
                pool.clone(),
                config.max_concurrent_writes,
                Duration::from_millis(config.write_timeout_ms),
            ),
            preimages: PreimageReader::new(pool, Duration::from_millis(config.preimage_timeout_ms)),
            max_header_bytes: config.max_header_bytes,
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn sink(&self) -> &AuditSink {
        &self.sink
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditMiddleware {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuditMiddleware<S> {
    inner: S,
    layer: AuditLayer,
}

impl<S> Service<Request> for AuditMiddleware<S>
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
        let layer = self.layer.clone();

        Box::pin(async move {
            let started = Instant::now();
            let method = request.method().clone();
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| request.uri().path().to_string());
            let resource_id = resource_id(&route, request.uri().path());

            let mut record = NewRequestLog {
                method: method.to_string(),
                query: request.uri().query().map(str::to_string),
                ip: client_ip(&request).map(|ip| ip.to_string()),
                headers: header_snapshot(request.headers(), layer.max_header_bytes),
                resource_id,
                path: route,
                ..NewRequestLog::default()
            };

            if method == Method::PATCH {
                if let Some(id) = record.resource_id.as_deref() {
                    record.original_data = layer.preimages.read(&record.path, id).await;
                }
            }

            let request = if matches!(method, Method::POST | Method::PATCH | Method::PUT) {
                let (parts, body) = request.into_parts();
                let prefix = read_prefix(body, layer.max_body_bytes).await;
                if let PrefixEnd::Failed(e) = prefix.end() {
                    debug!(error = %e, path = %record.path, "Request body failed during capture");
                }
                record.request_body = json_or_null(&prefix.head(layer.max_body_bytes));
                Request::from_parts(parts, prefix.into_body())
            } else {
                request
            };

            let response = inner.call(request).await?;

            record.status_code = i32::from(response.status().as_u16());
            record.duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
            if let Some(errors) = response.extensions().get::<RecordedErrors>() {
                record.error = errors.joined();
            }

            debug!(
                method = %record.method,
                path = %record.path,
                status = record.status_code,
                duration_ms = record.duration_ms,
                "Request handled"
            );

            let sink = layer.sink.clone();
            let (parts, body) = response.into_parts();
            let tee = TeeBody::new(
                body,
                layer.max_body_bytes,
                Box::new(move |captured, error| {
                    record.result_data = json_or_null(&captured);
                    if let Some(error) = error {
                        record.push_error(error);
                    }
                    sink.dispatch(record);
                }),
            );
            Ok(Response::from_parts(parts, Body::new(tee)))
        })
    }
}
