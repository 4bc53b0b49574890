use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::inventory::types::{SupplyItemProjection, ITEM_COLUMNS};
use crate::features::shared::pagination::PageParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSupplyItemsQuery {
    #[serde(default)]
    pub supply_id: Option<Uuid>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSupplyItemsResponse {
    pub items: Vec<SupplyItemProjection>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ListSupplyItemsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: &PgPool,
    query: ListSupplyItemsQuery,
) -> Result<ListSupplyItemsResponse, ListSupplyItemsError> {
    let limit = query.page.limit();
    let offset = query.page.offset();

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM supply_items WHERE ($1::uuid IS NULL OR supply_id = $1)",
    )
    .bind(query.supply_id)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, SupplyItemProjection>(&format!(
        r#"
        SELECT {ITEM_COLUMNS}
        FROM supply_items
        WHERE ($1::uuid IS NULL OR supply_id = $1)
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(query.supply_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(ListSupplyItemsResponse {
        items,
        total,
        limit,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{TestSupply, TestSupplyItem};

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_filter_by_supply(pool: PgPool) -> sqlx::Result<()> {
        let a = TestSupply::new("A").insert(&pool).await?;
        let b = TestSupply::new("B").insert(&pool).await?;
        for name in ["Soap", "Towels", "Buckets"] {
            TestSupplyItem::new(&a, name, 5).insert(&pool).await?;
        }
        TestSupplyItem::new(&b, "Shovels", 2).insert(&pool).await?;

        let all = handle(&pool, ListSupplyItemsQuery::default()).await.unwrap();
        assert_eq!(all.total, 4);
        assert_eq!(all.items.len(), 4);
        assert_eq!(all.limit, 100);

        let only_a = handle(
            &pool,
            ListSupplyItemsQuery {
                supply_id: Some(a.id),
                page: PageParams {
                    limit: Some("2".into()),
                    offset: None,
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(only_a.total, 3);
        assert_eq!(only_a.items.len(), 2);
        assert!(only_a.items.iter().all(|item| item.supply_id == a.id));
        Ok(())
    }
}
