//! Tower layer enforcing the access gate

use std::{
    future::Future,
    net::IpAddr,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value as JsonValue};
use tower::{Layer, Service};
use tracing::info;

use super::{policy::Decision, AccessGate, AdmissionError};
use crate::error::record_error;
use crate::middleware::client_ip::client_ip;

/// Country header set by the CDN
pub const COUNTRY_HEADER: &str = "cf-ipcountry";

/// Layer that rejects disallowed POST/PATCH requests with `403`
#[derive(Clone)]
pub struct AccessGateLayer {
    gate: AccessGate,
}

impl AccessGateLayer {
    pub fn new(gate: AccessGate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for AccessGateLayer {
    type Service = AccessGateMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessGateMiddleware {
            inner,
            gate: self.gate.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AccessGateMiddleware<S> {
    inner: S,
    gate: AccessGate,
}

impl<S> Service<Request> for AccessGateMiddleware<S>
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
        let gate = self.gate.clone();

        Box::pin(async move {
            if !super::AccessPolicy::applies_to(request.method()) {
                return inner.call(request).await;
            }

            let ip = client_ip(&request);
            let country = request
                .headers()
                .get(COUNTRY_HEADER)
                .and_then(|v| v.to_str().ok());

            match gate.evaluate(request.method(), ip, country) {
                Decision::Allow => inner.call(request).await,
                Decision::Deny(error) => {
                    info!(
                        method = %request.method(),
                        path = %request.uri().path(),
                        client_ip = ?ip,
                        reason = error.reason(),
                        "Request blocked"
                    );
                    Ok(blocked_response(&error, ip))
                },
            }
        })
    }
}

/// `403` body: `{"error":"blocked","reason":…,"ip":…}` plus any detail fields
pub fn blocked_response(error: &AdmissionError, ip: Option<IpAddr>) -> Response {
    let mut body = Map::new();
    body.insert("error".into(), json!("blocked"));
    body.insert("reason".into(), json!(error.reason()));
    body.insert("ip".into(), json!(ip.map(|ip| ip.to_string())));
    if let AdmissionError::CountryDisallowed { country } = error {
        body.insert("country".into(), json!(country));
    }

    let mut response = (StatusCode::FORBIDDEN, Json(JsonValue::Object(body))).into_response();
    record_error(&mut response, format!("blocked: {}", error.reason()));
    response
}
