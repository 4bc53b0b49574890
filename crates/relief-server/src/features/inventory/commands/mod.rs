pub mod distribute;
pub mod update_supply;

pub use distribute::{apply_batch, DistributeInput, LedgerEntry, LedgerError, MAX_BATCH_SIZE};
pub use update_supply::{UpdateSupplyCommand, UpdateSupplyError};
