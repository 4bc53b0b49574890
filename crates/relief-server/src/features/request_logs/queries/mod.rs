pub mod get;
pub mod list;

pub use get::GetRequestLogError;
pub use list::{ListRequestLogsError, ListRequestLogsQuery, ListRequestLogsResponse};
