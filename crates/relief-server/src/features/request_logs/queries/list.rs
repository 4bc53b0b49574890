//! List stored request logs, newest first

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::audit::{count_request_logs, list_request_logs, RequestLogEntry};
use crate::features::shared::pagination::PageParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequestLogsQuery {
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRequestLogsResponse {
    pub logs: Vec<RequestLogEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ListRequestLogsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn handle(
    pool: &PgPool,
    query: ListRequestLogsQuery,
) -> Result<ListRequestLogsResponse, ListRequestLogsError> {
    let limit = query.page.limit();
    let offset = query.page.offset();

    let total = count_request_logs(pool).await?;
    let logs = list_request_logs(pool, limit, offset).await?;

    Ok(ListRequestLogsResponse {
        logs,
        total,
        limit,
        offset,
    })
}
