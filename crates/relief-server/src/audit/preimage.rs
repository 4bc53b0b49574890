//! Current resource state read before a PATCH is applied

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::debug;

/// Routes that address a single row, and the table holding it
const RESOURCE_TABLES: &[(&str, &str)] = &[
    ("/supplies/:id", "supplies"),
    ("/supply_items/:id", "supply_items"),
];

/// Looks up pre-images through a route → table map
#[derive(Clone)]
pub struct PreimageReader {
    pool: PgPool,
    tables: HashMap<&'static str, &'static str>,
    timeout: Duration,
}

impl PreimageReader {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool,
            tables: RESOURCE_TABLES.iter().copied().collect(),
            timeout,
        }
    }

    pub fn table_for(&self, route: &str) -> Option<&'static str> {
        self.tables.get(route).copied()
    }

    /// Row as a JSON document, or `None` for unknown routes, missing rows,
    /// failures and timeouts
    pub async fn read(&self, route: &str, id: &str) -> Option<JsonValue> {
        let table = self.table_for(route)?;
        // table names come from the static map above, never from the request
        let sql = format!("SELECT row_to_json(t) FROM {table} t WHERE t.id::text = $1");
        let query = sqlx::query_scalar::<_, JsonValue>(&sql)
            .bind(id)
            .fetch_optional(&self.pool);

        match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(row)) => row,
            Ok(Err(e)) => {
                debug!(error = %e, table, id, "Pre-image read failed");
                None
            },
            Err(_) => {
                debug!(table, id, timeout = ?self.timeout, "Pre-image read timed out");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_reads_supply_row(pool: PgPool) -> sqlx::Result<()> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO supplies (name, address) VALUES ('Gym shelter', '3 Rue Haute') RETURNING id",
        )
        .fetch_one(&pool)
        .await?;

        let reader = PreimageReader::new(pool, Duration::from_secs(1));
        let row = reader
            .read("/supplies/:id", &id.to_string())
            .await
            .expect("row");
        assert_eq!(row["name"], json!("Gym shelter"));
        assert_eq!(row["id"], json!(id.to_string()));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_unknown_route_or_missing_row(pool: PgPool) -> sqlx::Result<()> {
        let reader = PreimageReader::new(pool, Duration::from_secs(1));
        assert!(reader.read("/shelters/:id", "6f1c1f0e-7f1f-4f57-9d8e-2b8f3f4c9a10").await.is_none());
        assert!(reader
            .read("/supply_items/:id", &Uuid::new_v4().to_string())
            .await
            .is_none());
        assert!(reader.read("/supplies/:id", "not-a-uuid").await.is_none());
        Ok(())
    }
}
