use sqlx::PgPool;
use uuid::Uuid;

use crate::features::inventory::types::{SupplyItemProjection, ITEM_COLUMNS};

#[derive(Debug, thiserror::Error)]
pub enum GetSupplyItemError {
    #[error("Supply item '{0}' not found")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[tracing::instrument(skip(pool))]
pub async fn handle(pool: &PgPool, id: &str) -> Result<SupplyItemProjection, GetSupplyItemError> {
    let item_id = Uuid::parse_str(id).map_err(|_| GetSupplyItemError::NotFound(id.to_string()))?;

    sqlx::query_as::<_, SupplyItemProjection>(&format!(
        "SELECT {ITEM_COLUMNS} FROM supply_items WHERE id = $1"
    ))
    .bind(item_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| GetSupplyItemError::NotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestSupply, TestSupplyItem};

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_get_existing_item(pool: PgPool) -> sqlx::Result<()> {
        let supply = TestSupply::new("Ferry terminal").insert(&pool).await?;
        let item = TestSupplyItem::new(&supply, "Diapers", 40)
            .with_received(12)
            .with_tag("baby")
            .with_unit("pack")
            .insert(&pool)
            .await?;

        let found = handle(&pool, &item.id.to_string()).await.unwrap();
        assert_eq!(found.id, item.id);
        assert_eq!(found.tag.as_deref(), Some("baby"));
        assert_eq!(found.unit.as_deref(), Some("pack"));
        assert_eq!((found.received_count, found.total_count), (12, 40));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_missing_item(pool: PgPool) -> sqlx::Result<()> {
        let err = handle(&pool, &Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, GetSupplyItemError::NotFound(_)));
        let err = handle(&pool, "42").await.unwrap_err();
        assert!(matches!(err, GetSupplyItemError::NotFound(_)));
        Ok(())
    }
}
