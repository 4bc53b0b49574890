//! Test fixtures for inventory tables
//!
//! # Examples
//!
//! ```rust,ignore
//! use relief_server::features::shared::test_helpers::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_something(pool: PgPool) -> sqlx::Result<()> {
//!     let supply = TestSupply::new("Riverside shelter").insert(&pool).await?;
//!     let water = TestSupplyItem::new(&supply, "Water 1.5L", 5)
//!         .with_received(2)
//!         .insert(&pool)
//!         .await?;
//!     // ... test logic ...
//!     Ok(())
//! }
//! ```

use sqlx::PgPool;
use uuid::Uuid;

/// Builder for `supplies` rows
#[derive(Debug, Clone)]
pub struct TestSupply {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl TestSupply {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address: None,
            phone: None,
        }
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    pub async fn insert(self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query("INSERT INTO supplies (id, name, address, phone) VALUES ($1, $2, $3, $4)")
            .bind(self.id)
            .bind(&self.name)
            .bind(&self.address)
            .bind(&self.phone)
            .execute(pool)
            .await?;
        Ok(self)
    }
}

/// Builder for `supply_items` rows
#[derive(Debug, Clone)]
pub struct TestSupplyItem {
    pub id: Uuid,
    pub supply_id: Uuid,
    pub tag: Option<String>,
    pub name: String,
    pub received_count: i32,
    pub total_count: i32,
    pub unit: Option<String>,
}

impl TestSupplyItem {
    pub fn new(supply: &TestSupply, name: &str, total_count: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            supply_id: supply.id,
            tag: None,
            name: name.to_string(),
            received_count: 0,
            total_count,
            unit: None,
        }
    }

    pub fn with_received(mut self, received_count: i32) -> Self {
        self.received_count = received_count;
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub async fn insert(self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query(
            r#"
            INSERT INTO supply_items (id, supply_id, tag, name, received_count, total_count, unit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(self.supply_id)
        .bind(&self.tag)
        .bind(&self.name)
        .bind(self.received_count)
        .bind(self.total_count)
        .bind(&self.unit)
        .execute(pool)
        .await?;
        Ok(self)
    }
}

/// Current `received_count` of an item
pub async fn received_count(pool: &PgPool, id: Uuid) -> sqlx::Result<i32> {
    sqlx::query_scalar("SELECT received_count FROM supply_items WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}
