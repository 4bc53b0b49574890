//! Supply inventory: the distribution ledger and the reads that observe it
//!
//! `received_count` only moves through [`commands::apply_batch`], which keeps
//! `0 <= received_count <= total_count` for every item (also enforced by a
//! table CHECK constraint).

pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use commands::{
    apply_batch, DistributeInput, LedgerEntry, LedgerError, UpdateSupplyCommand,
    UpdateSupplyError, MAX_BATCH_SIZE,
};
pub use queries::{
    GetSupplyItemError, ListSupplyItemsError, ListSupplyItemsQuery, ListSupplyItemsResponse,
    SupplyProgress, SupplyProgressError,
};
pub use routes::inventory_routes;
pub use types::{Supply, SupplyItemProjection};
