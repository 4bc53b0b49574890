//! Test helpers for relief server integration tests
//!
//! Databases are provisioned per test by `#[sqlx::test]`; these helpers
//! build the full router on top of that pool and seed rows directly.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use relief_server::{
    access::AccessGate,
    api::{create_router, AppState},
    config::Config,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use uuid::Uuid;

/// Full pipeline with default settings and the deny-list loaded from `pool`
pub async fn test_app(pool: PgPool) -> Router {
    test_app_with(pool, Config::default()).await
}

pub async fn test_app_with(pool: PgPool, config: Config) -> Router {
    let gate = AccessGate::connect(&config.access, pool.clone()).await;
    create_router(AppState {
        db: pool,
        gate,
        config: Arc::new(config),
    })
}

pub struct Sent {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Sent {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }
}

/// Send a request and drain the body so the request log entry is dispatched
pub async fn send(app: &Router, request: Request<Body>) -> Sent {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    Sent {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, ip: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("cf-connecting-ip", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn insert_supply(pool: &PgPool, name: &str) -> sqlx::Result<Uuid> {
    sqlx::query_scalar("INSERT INTO supplies (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
}

pub async fn insert_item(
    pool: &PgPool,
    supply_id: Uuid,
    name: &str,
    total_count: i32,
    received_count: i32,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar(
        "INSERT INTO supply_items (supply_id, name, total_count, received_count) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(supply_id)
    .bind(name)
    .bind(total_count)
    .bind(received_count)
    .fetch_one(pool)
    .await
}

pub async fn received_count(pool: &PgPool, item_id: Uuid) -> sqlx::Result<i32> {
    sqlx::query_scalar("SELECT received_count FROM supply_items WHERE id = $1")
        .bind(item_id)
        .fetch_one(pool)
        .await
}

pub async fn deny(pool: &PgPool, pattern: &str) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO ip_denylist (pattern, reason) VALUES ($1, 'test')")
        .bind(pattern)
        .execute(pool)
        .await
        .map(|_| ())
}

#[derive(Debug, sqlx::FromRow)]
pub struct LoggedRequest {
    pub method: String,
    pub path: String,
    pub ip: Option<String>,
    pub status_code: i32,
    pub error: Option<String>,
    pub request_body: Option<serde_json::Value>,
    pub original_data: Option<serde_json::Value>,
    pub result_data: Option<serde_json::Value>,
    pub resource_id: Option<String>,
}

/// Poll until at least `expected` request log rows exist
pub async fn wait_for_logs(pool: &PgPool, expected: usize) -> Vec<LoggedRequest> {
    let mut rows = Vec::new();
    for _ in 0..50 {
        rows = sqlx::query_as::<_, LoggedRequest>(
            "SELECT method, path, ip, status_code, error, request_body, original_data, result_data, resource_id \
             FROM request_logs ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .unwrap();
        if rows.len() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    rows
}
