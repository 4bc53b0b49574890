//! Relief coordination API server
//!
//! HTTP server coordinating disaster-relief resources. Every request passes
//! through the same pipeline, outermost first:
//!
//! - **Request log** ([`audit`]): one row per request in `request_logs`,
//!   written asynchronously once the response is done
//! - **Conditional cache** ([`cache`]): `ETag`/`Cache-Control` for GET and
//!   `304 Not Modified` on a matching `If-None-Match`
//! - **Access gate** ([`access`]): IP/CIDR and country admission for POST
//!   and PATCH, with a deny-list refreshed from the database
//! - **Handlers** ([`features`]): the supply inventory ledger and the
//!   administrative request log listing
//!
//! ## Framework Stack
//!
//! - **Axum**: web framework
//! - **SQLx**: PostgreSQL access and migrations
//! - **Tower**: middleware and service abstractions
//!
//! # Example
//!
//! ```no_run
//! use relief_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod api;
pub mod audit;
pub mod body;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;

// Re-export commonly used types
pub use error::{AppError, AppResult, RecordedErrors};
