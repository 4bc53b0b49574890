use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Aggregate fill state of one supply request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupplyProgress {
    pub supply_id: Uuid,
    pub items: i64,
    pub total_count: i64,
    pub received_count: i64,
    pub completed_items: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SupplyProgressError {
    #[error("Supply '{0}' not found")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[tracing::instrument(skip(pool))]
pub async fn handle(pool: &PgPool, id: &str) -> Result<SupplyProgress, SupplyProgressError> {
    let supply_id = Uuid::parse_str(id).map_err(|_| SupplyProgressError::NotFound(id.to_string()))?;

    sqlx::query_as::<_, SupplyProgress>(
        r#"
        SELECT
            s.id AS supply_id,
            COUNT(i.id) AS items,
            COALESCE(SUM(i.total_count), 0)::BIGINT AS total_count,
            COALESCE(SUM(i.received_count), 0)::BIGINT AS received_count,
            COUNT(i.id) FILTER (WHERE i.received_count >= i.total_count) AS completed_items
        FROM supplies s
        LEFT JOIN supply_items i ON i.supply_id = s.id
        WHERE s.id = $1
        GROUP BY s.id
        "#,
    )
    .bind(supply_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| SupplyProgressError::NotFound(id.to_string()))
}
