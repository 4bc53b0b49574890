pub mod get_item;
pub mod list_items;
pub mod progress;

pub use get_item::GetSupplyItemError;
pub use list_items::{ListSupplyItemsError, ListSupplyItemsQuery, ListSupplyItemsResponse};
pub use progress::{SupplyProgress, SupplyProgressError};
