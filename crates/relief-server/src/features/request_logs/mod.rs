//! Administrative listing of the request log

pub mod queries;
pub mod routes;

pub use queries::{GetRequestLogError, ListRequestLogsError, ListRequestLogsQuery, ListRequestLogsResponse};
pub use routes::{request_logs_routes, REQUEST_LOGS_PATH};
