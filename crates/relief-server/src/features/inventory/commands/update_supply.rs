use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::features::inventory::types::Supply;

const SUPPLY_COLUMNS: &str = "id, name, address, phone, notes, created_at, updated_at";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSupplyCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateSupplyError {
    #[error("At least one field must be provided for update")]
    NoFieldsToUpdate,
    #[error("Name cannot be empty or only whitespace")]
    NameEmpty,
    #[error("Name must be at most 255 characters")]
    NameLength,
    #[error("Supply '{0}' not found")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl UpdateSupplyCommand {
    pub fn validate(&self) -> Result<(), UpdateSupplyError> {
        if self.name.is_none() && self.address.is_none() && self.phone.is_none() && self.notes.is_none()
        {
            return Err(UpdateSupplyError::NoFieldsToUpdate);
        }
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(UpdateSupplyError::NameEmpty);
            }
            if name.chars().count() > 255 {
                return Err(UpdateSupplyError::NameLength);
            }
        }
        Ok(())
    }
}

/// Update the provided fields of a supply; absent fields are left unchanged
#[tracing::instrument(skip(pool, command))]
pub async fn handle(
    pool: &PgPool,
    id: &str,
    command: UpdateSupplyCommand,
) -> Result<Supply, UpdateSupplyError> {
    command.validate()?;
    let supply_id = Uuid::parse_str(id).map_err(|_| UpdateSupplyError::NotFound(id.to_string()))?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE supplies SET ");
    let mut fields = builder.separated(", ");
    for (column, value) in [
        ("name", command.name),
        ("address", command.address),
        ("phone", command.phone),
        ("notes", command.notes),
    ] {
        if let Some(value) = value {
            fields.push(format!("{column} = "));
            fields.push_bind_unseparated(value);
        }
    }
    fields.push("updated_at = NOW()");
    builder.push(" WHERE id = ");
    builder.push_bind(supply_id);
    builder.push(" RETURNING ");
    builder.push(SUPPLY_COLUMNS);

    builder
        .build_query_as::<Supply>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| UpdateSupplyError::NotFound(id.to_string()))
}
