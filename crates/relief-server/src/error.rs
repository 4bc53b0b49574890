//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;

/// Result type alias for server operations
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "INTERNAL_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!(error = ?e, "Database error");
                "A database error occurred".to_string()
            },
            AppError::NotFound(ref message) | AppError::BadRequest(ref message) => message.clone(),
        };

        let recorded = RecordedErrors::single(self.to_string());
        let mut response = (status, Json(ErrorResponse::new(self.code(), message))).into_response();
        recorded.attach(&mut response);
        response
    }
}

// ============================================================================
// Recorded Errors
// ============================================================================

/// Error messages a handler or layer wants written to the request log
///
/// Stored as a response extension; the audit layer joins the entries with
/// `"; "` into the record's `error` column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedErrors(Vec<String>);

impl RecordedErrors {
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn joined(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join("; "))
        }
    }

    /// Merge into any errors already attached to `response`
    pub fn attach(self, response: &mut Response) {
        match response.extensions_mut().get_mut::<RecordedErrors>() {
            Some(existing) => existing.0.extend(self.0),
            None => {
                response.extensions_mut().insert(self);
            },
        }
    }
}

/// Attach a single error message to `response`
pub fn record_error(response: &mut Response, message: impl Into<String>) {
    RecordedErrors::single(message).attach(response);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Database(sqlx::Error::RowNotFound).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_recorded_errors_accumulate() {
        let mut response = StatusCode::OK.into_response();
        record_error(&mut response, "blocked: ip denied");
        record_error(&mut response, "second");

        let recorded = response.extensions().get::<RecordedErrors>().unwrap();
        assert_eq!(recorded.joined().as_deref(), Some("blocked: ip denied; second"));
    }

    #[test]
    fn test_app_error_response_records_itself() {
        let response = AppError::BadRequest("limit must be numeric".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let recorded = response.extensions().get::<RecordedErrors>().unwrap();
        assert_eq!(
            recorded.joined().as_deref(),
            Some("Bad request: limit must be numeric")
        );
    }
}
