use crate::api::response::{ApiResponse, HydraCollection};
use crate::error::{AppError, AppResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use sqlx::PgPool;

use super::queries::{GetRequestLogError, ListRequestLogsError, ListRequestLogsQuery};

pub const REQUEST_LOGS_PATH: &str = "/_admin/request_logs";

pub fn request_logs_routes() -> Router<PgPool> {
    Router::new()
        .route(REQUEST_LOGS_PATH, get(list_request_logs))
        .route("/_admin/request_logs/:id", get(get_request_log))
}

#[tracing::instrument(skip(pool, query))]
async fn list_request_logs(
    State(pool): State<PgPool>,
    Query(query): Query<ListRequestLogsQuery>,
) -> AppResult<Response> {
    let response = super::queries::list::handle(&pool, query).await?;

    tracing::debug!(count = response.logs.len(), total = response.total, "Request logs listed");

    let collection = HydraCollection::page(
        REQUEST_LOGS_PATH,
        response.logs,
        response.total,
        response.limit,
        response.offset,
    );
    Ok((StatusCode::OK, Json(collection)).into_response())
}

#[tracing::instrument(skip(pool))]
async fn get_request_log(State(pool): State<PgPool>, Path(id): Path<String>) -> AppResult<Response> {
    let detail = super::queries::get::handle(&pool, &id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(detail))).into_response())
}

impl From<ListRequestLogsError> for AppError {
    fn from(error: ListRequestLogsError) -> Self {
        match error {
            ListRequestLogsError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<GetRequestLogError> for AppError {
    fn from(error: GetRequestLogError) -> Self {
        match error {
            e @ GetRequestLogError::InvalidId(_) => AppError::BadRequest(e.to_string()),
            e @ GetRequestLogError::NotFound(_) => AppError::NotFound(e.to_string()),
            GetRequestLogError::Database(e) => AppError::Database(e),
        }
    }
}
