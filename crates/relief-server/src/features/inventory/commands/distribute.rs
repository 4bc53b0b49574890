//! Batched distribution against `supply_items`
//!
//! A batch raises `received_count` on one or more items inside a single
//! transaction. Each row is locked with `FOR UPDATE` in the order the caller
//! listed it, so two batches touching the same item serialize. Any failing
//! entry aborts the batch and the transaction rolls back on drop.
//!
//! Lock order is not canonicalized: two concurrent batches that list the same
//! items in different orders can deadlock, and PostgreSQL will abort one.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::inventory::types::{SupplyItemProjection, ITEM_COLUMNS};

/// Upper bound on entries per batch, bounding how many row locks one
/// transaction can hold
pub const MAX_BATCH_SIZE: usize = 500;

/// One `{id, count}` element of a request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributeInput {
    pub id: String,
    pub count: i64,
}

/// A single adjustment in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub item_id: String,
    pub delta: i64,
    /// When set, the item must belong to this supply
    pub parent_id: Option<String>,
}

impl LedgerEntry {
    pub fn from_inputs(inputs: Vec<DistributeInput>, parent_id: Option<&str>) -> Vec<Self> {
        inputs
            .into_iter()
            .map(|input| Self {
                item_id: input.id,
                delta: input.count,
                parent_id: parent_id.map(str::to_string),
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("batch is empty")]
    EmptyBatch,
    #[error("batch has {0} entries, at most {MAX_BATCH_SIZE} allowed")]
    BatchTooLarge(usize),
    #[error("supply item '{id}' not found")]
    NotFound { id: String },
    #[error("supply item '{id}' does not belong to supply '{parent_id}'")]
    OwnershipMismatch { id: String, parent_id: String },
    #[error("count for '{id}' must be greater than 0, got {count}")]
    InvalidCount { id: String, count: i64 },
    #[error(
        "supply item '{id}' would exceed total_count: {received_count} + {attempted} > {total_count}"
    )]
    ExceedsTotal {
        id: String,
        received_count: i32,
        total_count: i32,
        attempted: i64,
    },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// Reason code carried in the error envelope
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyBatch => "empty_batch",
            Self::BatchTooLarge(_) => "batch_too_large",
            Self::NotFound { .. } => "not_found",
            Self::OwnershipMismatch { .. } => "ownership_mismatch",
            Self::InvalidCount { .. } => "invalid_count",
            Self::ExceedsTotal { .. } => "exceeds_total",
            Self::Database(_) => "database",
        }
    }

    /// Structured context naming the offending item
    pub fn details(&self) -> Option<JsonValue> {
        match self {
            Self::EmptyBatch | Self::Database(_) => None,
            Self::BatchTooLarge(len) => Some(json!({"entries": len, "max": MAX_BATCH_SIZE})),
            Self::NotFound { id } => Some(json!({"id": id})),
            Self::OwnershipMismatch { id, parent_id } => {
                Some(json!({"id": id, "supply_id": parent_id}))
            },
            Self::InvalidCount { id, count } => Some(json!({"id": id, "count": count})),
            Self::ExceedsTotal {
                id,
                received_count,
                total_count,
                attempted,
            } => Some(json!({
                "id": id,
                "received_count": received_count,
                "total_count": total_count,
                "attempted": attempted,
            })),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LockedItem {
    supply_id: Uuid,
    received_count: i32,
    total_count: i32,
}

fn validate(entries: &[LedgerEntry]) -> Result<(), LedgerError> {
    if entries.is_empty() {
        return Err(LedgerError::EmptyBatch);
    }
    if entries.len() > MAX_BATCH_SIZE {
        return Err(LedgerError::BatchTooLarge(entries.len()));
    }
    Ok(())
}

/// Apply every entry or none, returning the updated items in input order
#[tracing::instrument(skip(pool, entries), fields(entries = entries.len()))]
pub async fn apply_batch(
    pool: &PgPool,
    entries: &[LedgerEntry],
) -> Result<Vec<SupplyItemProjection>, LedgerError> {
    validate(entries)?;

    let mut tx = pool.begin().await?;
    let mut updated = Vec::with_capacity(entries.len());
    let update_sql = format!(
        "UPDATE supply_items SET received_count = $1, updated_at = NOW() WHERE id = $2 RETURNING {ITEM_COLUMNS}"
    );

    for entry in entries {
        let not_found = || LedgerError::NotFound {
            id: entry.item_id.clone(),
        };
        let item_id = Uuid::parse_str(&entry.item_id).map_err(|_| not_found())?;

        let locked = sqlx::query_as::<_, LockedItem>(
            "SELECT supply_id, received_count, total_count FROM supply_items WHERE id = $1 FOR UPDATE",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(not_found)?;

        if let Some(parent_id) = entry.parent_id.as_deref() {
            let owned = Uuid::parse_str(parent_id.trim()).is_ok_and(|p| p == locked.supply_id);
            if !owned {
                return Err(LedgerError::OwnershipMismatch {
                    id: entry.item_id.clone(),
                    parent_id: parent_id.to_string(),
                });
            }
        }

        if entry.delta <= 0 {
            return Err(LedgerError::InvalidCount {
                id: entry.item_id.clone(),
                count: entry.delta,
            });
        }

        let new_received = i64::from(locked.received_count) + entry.delta;
        if new_received > i64::from(locked.total_count) {
            return Err(LedgerError::ExceedsTotal {
                id: entry.item_id.clone(),
                received_count: locked.received_count,
                total_count: locked.total_count,
                attempted: entry.delta,
            });
        }
        // bounded by total_count, which is an i32
        let new_received = i32::try_from(new_received).unwrap_or(locked.total_count);

        let item = sqlx::query_as::<_, SupplyItemProjection>(&update_sql)
            .bind(new_received)
            .bind(item_id)
            .fetch_one(&mut *tx)
            .await?;
        updated.push(item);
    }

    tx.commit().await?;

    tracing::info!(items = updated.len(), "Distribution batch committed");

    Ok(updated)
}
