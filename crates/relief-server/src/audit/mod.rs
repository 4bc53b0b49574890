//! Request log (audit trail)
//!
//! Every HTTP request produces one append-only row in `request_logs`:
//! method, matched route, query, client address, a bounded header snapshot,
//! status, recorded errors, duration, request body, and for mutating methods
//! the resource state before (PATCH pre-image) and the response body after.
//!
//! Rows are written by detached tasks once the response body is done. Writes
//! are best-effort: a full write pool, a timeout or a database error loses
//! the row and logs a warning, never failing the request.
//!
//! # Usage
//!
//! ```no_run
//! use axum::Router;
//! use sqlx::PgPool;
//! use relief_server::{audit::AuditLayer, config::AuditConfig};
//!
//! # async fn example(pool: PgPool) {
//! let app: Router = Router::new().layer(AuditLayer::new(pool, &AuditConfig::default()));
//! # }
//! ```

mod capture;
mod middleware;
mod models;
mod preimage;
mod queries;
mod sink;


pub use capture::{OnComplete, TeeBody};
pub use middleware::{AuditLayer, AuditMiddleware};
pub use models::{
    header_snapshot, json_or_null, resource_id, NewRequestLog, RequestLogDetail,
    RequestLogEntry,
};
pub use preimage::PreimageReader;
pub use queries::{count_request_logs, get_request_log, insert_request_log, list_request_logs};
pub use sink::{AuditPersistenceError, AuditSink};
