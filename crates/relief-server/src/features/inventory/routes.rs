use crate::api::response::{ApiResponse, ErrorResponse, HydraCollection};
use crate::error::record_error;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sqlx::PgPool;

use super::{
    commands::{
        apply_batch, DistributeInput, LedgerEntry, LedgerError, UpdateSupplyCommand,
        UpdateSupplyError,
    },
    queries::{GetSupplyItemError, ListSupplyItemsError, ListSupplyItemsQuery, SupplyProgressError},
};

pub fn inventory_routes() -> Router<PgPool> {
    Router::new()
        .route("/supplies/:id", post(distribute_for_supply).patch(update_supply))
        .route("/supplies/:id/progress", get(get_supply_progress))
        .route("/supply_items", get(list_supply_items))
        .route("/supply_items/distribute", post(distribute))
        .route("/supply_items/:id", get(get_supply_item))
}

#[tracing::instrument(skip(pool, body), fields(supply_id = %id))]
async fn distribute_for_supply(
    State(pool): State<PgPool>,
    Path(id): Path<String>,
    body: Result<Json<Vec<DistributeInput>>, JsonRejection>,
) -> Result<Response, InventoryApiError> {
    let Json(inputs) = body?;
    let entries = LedgerEntry::from_inputs(inputs, Some(&id));
    let updated = apply_batch(&pool, &entries).await?;

    tracing::info!(items = updated.len(), "Supply items distributed via API");

    Ok((StatusCode::OK, Json(updated)).into_response())
}

#[tracing::instrument(skip(pool, body))]
async fn distribute(
    State(pool): State<PgPool>,
    body: Result<Json<Vec<DistributeInput>>, JsonRejection>,
) -> Result<Response, InventoryApiError> {
    let Json(inputs) = body?;
    let entries = LedgerEntry::from_inputs(inputs, None);
    let updated = apply_batch(&pool, &entries).await?;

    tracing::info!(items = updated.len(), "Supply items distributed via API");

    Ok((StatusCode::OK, Json(updated)).into_response())
}

#[tracing::instrument(skip(pool, body), fields(supply_id = %id))]
async fn update_supply(
    State(pool): State<PgPool>,
    Path(id): Path<String>,
    body: Result<Json<UpdateSupplyCommand>, JsonRejection>,
) -> Result<Response, InventoryApiError> {
    let Json(command) = body?;
    let supply = super::commands::update_supply::handle(&pool, &id, command).await?;

    tracing::info!(supply_id = %supply.id, "Supply updated via API");

    Ok((StatusCode::OK, Json(ApiResponse::success(supply))).into_response())
}

#[tracing::instrument(skip(pool), fields(id = %id))]
async fn get_supply_item(
    State(pool): State<PgPool>,
    Path(id): Path<String>,
) -> Result<Response, InventoryApiError> {
    let item = super::queries::get_item::handle(&pool, &id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(item))).into_response())
}

#[tracing::instrument(skip(pool, query))]
async fn list_supply_items(
    State(pool): State<PgPool>,
    Query(query): Query<ListSupplyItemsQuery>,
) -> Result<Response, InventoryApiError> {
    let base_path = match query.supply_id {
        Some(supply_id) => format!("/supply_items?supply_id={}", supply_id),
        None => "/supply_items".to_string(),
    };
    let response = super::queries::list_items::handle(&pool, query).await?;

    tracing::debug!(count = response.items.len(), total = response.total, "Supply items listed via API");

    let collection = HydraCollection::page(
        &base_path,
        response.items,
        response.total,
        response.limit,
        response.offset,
    );
    Ok((StatusCode::OK, Json(collection)).into_response())
}

#[tracing::instrument(skip(pool), fields(supply_id = %id))]
async fn get_supply_progress(
    State(pool): State<PgPool>,
    Path(id): Path<String>,
) -> Result<Response, InventoryApiError> {
    let progress = super::queries::progress::handle(&pool, &id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(progress))).into_response())
}

#[derive(Debug, thiserror::Error)]
enum InventoryApiError {
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Update(#[from] UpdateSupplyError),
    #[error(transparent)]
    GetItem(#[from] GetSupplyItemError),
    #[error(transparent)]
    ListItems(#[from] ListSupplyItemsError),
    #[error(transparent)]
    Progress(#[from] SupplyProgressError),
}

fn database_error_response(context: &str, error: &dyn std::fmt::Display) -> (StatusCode, ErrorResponse) {
    tracing::error!(error = %error, "Database error during {}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new("INTERNAL_ERROR", "A database error occurred"),
    )
}

impl IntoResponse for InventoryApiError {
    fn into_response(self) -> Response {
        let recorded = match &self {
            InventoryApiError::Ledger(e) => format!("{}: {}", e.code(), e),
            other => other.to_string(),
        };

        let (status, body) = match &self {
            InventoryApiError::InvalidBody(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_body", rejection.body_text()),
            ),

            InventoryApiError::Ledger(e @ LedgerError::Database(_)) => {
                database_error_response("distribution", e)
            },
            InventoryApiError::Ledger(e) => {
                let status = match e {
                    LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                let body = match e.details() {
                    Some(details) => ErrorResponse::with_details(e.code(), e.to_string(), details),
                    None => ErrorResponse::new(e.code(), e.to_string()),
                };
                (status, body)
            },

            InventoryApiError::Update(
                e @ (UpdateSupplyError::NoFieldsToUpdate
                | UpdateSupplyError::NameEmpty
                | UpdateSupplyError::NameLength),
            ) => (StatusCode::BAD_REQUEST, ErrorResponse::new("VALIDATION_ERROR", e.to_string())),
            InventoryApiError::Update(e @ UpdateSupplyError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", e.to_string()))
            },
            InventoryApiError::Update(e @ UpdateSupplyError::Database(_)) => {
                database_error_response("supply update", e)
            },

            InventoryApiError::GetItem(e @ GetSupplyItemError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", e.to_string()))
            },
            InventoryApiError::GetItem(e @ GetSupplyItemError::Database(_)) => {
                database_error_response("supply item retrieval", e)
            },

            InventoryApiError::ListItems(e) => database_error_response("supply item listing", e),

            InventoryApiError::Progress(e @ SupplyProgressError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", e.to_string()))
            },
            InventoryApiError::Progress(e @ SupplyProgressError::Database(_)) => {
                database_error_response("supply progress", e)
            },
        };

        let mut response = (status, Json(body)).into_response();
        record_error(&mut response, recorded);
        response
    }
}
