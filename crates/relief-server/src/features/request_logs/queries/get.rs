//! Fetch a single request log with its captured bodies

use sqlx::PgPool;

use crate::audit::{get_request_log, RequestLogDetail};

#[derive(Debug, thiserror::Error)]
pub enum GetRequestLogError {
    #[error("Request log id must be a positive integer, got '{0}'")]
    InvalidId(String),
    #[error("Request log '{0}' not found")]
    NotFound(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn handle(pool: &PgPool, id: &str) -> Result<RequestLogDetail, GetRequestLogError> {
    let parsed: i64 = id
        .trim()
        .parse()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| GetRequestLogError::InvalidId(id.to_string()))?;

    get_request_log(pool, parsed)
        .await?
        .ok_or(GetRequestLogError::NotFound(parsed))
}
