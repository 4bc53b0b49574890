//! API response types
//!
//! Standard envelopes shared by the relief API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard success response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Standard error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an error response with details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }
}

/// Hydra-style collection envelope used by the admin listings
#[derive(Debug, Serialize, Deserialize)]
pub struct HydraCollection<T> {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "totalItems")]
    pub total_items: i64,
    pub member: Vec<T>,
    pub limit: i64,
    pub offset: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

pub const HYDRA_CONTEXT: &str = "https://www.w3.org/ns/hydra/context.jsonld";

impl<T> HydraCollection<T> {
    /// Build a page, deriving `next`/`previous` links from `base_path`
    ///
    /// `base_path` may already carry a query string (filters to preserve).
    pub fn page(base_path: &str, member: Vec<T>, total_items: i64, limit: i64, offset: i64) -> Self {
        let sep = if base_path.contains('?') { '&' } else { '?' };
        let next = (offset + limit < total_items)
            .then(|| format!("{}{}limit={}&offset={}", base_path, sep, limit, offset + limit));
        let previous = (offset > 0).then(|| {
            format!("{}{}limit={}&offset={}", base_path, sep, limit, (offset - limit).max(0))
        });

        Self {
            context: HYDRA_CONTEXT.to_string(),
            kind: "Collection".to_string(),
            total_items,
            member,
            limit,
            offset,
            next,
            previous,
        }
    }
}
