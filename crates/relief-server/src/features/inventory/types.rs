use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Columns every inventory read and write returns
pub(crate) const ITEM_COLUMNS: &str =
    "id, supply_id, tag, name, received_count, total_count, unit";

/// Public view of a `supply_items` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupplyItemProjection {
    pub id: Uuid,
    pub supply_id: Uuid,
    pub tag: Option<String>,
    pub name: String,
    pub received_count: i32,
    pub total_count: i32,
    pub unit: Option<String>,
}

/// A `supplies` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Supply {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
