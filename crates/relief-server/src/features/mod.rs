//! Feature slices of the relief API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes.
//!
//! # Features
//!
//! - **inventory**: distribution ledger for supply items, plus the reads
//!   clients use to observe fill state
//! - **request_logs**: administrative listing and detail of the request log
//!
//! # Architecture
//!
//! - `commands/` - write operations
//! - `queries/` - read operations
//! - `routes.rs` - HTTP route definitions and error mapping
//! - `types.rs` - shared row types (if needed)

pub mod inventory;
pub mod request_logs;
pub mod shared;

use axum::Router;
use sqlx::PgPool;

/// All feature routes, mounted at their absolute paths
pub fn router(db: PgPool) -> Router<()> {
    Router::new()
        .merge(inventory::inventory_routes())
        .merge(request_logs::request_logs_routes())
        .with_state(db)
}
