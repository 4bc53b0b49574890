//! Offset pagination for list endpoints
//!
//! Query values are parsed leniently: a missing or unparsable value falls
//! back to the default, an out-of-range value is clamped.
//!
//! # Examples
//!
//! ```rust,ignore
//! use relief_server::features::shared::pagination::PageParams;
//!
//! let params = PageParams { limit: Some("900".into()), offset: Some("x".into()) };
//! assert_eq!(params.limit(), 500);
//! assert_eq!(params.offset(), 0);
//! ```

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 500;
pub const MAX_OFFSET: i64 = 1_000_000;

/// Raw `limit`/`offset` query values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        parse_bounded(self.limit.as_deref(), DEFAULT_LIMIT, 1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        parse_bounded(self.offset.as_deref(), 0, 0, MAX_OFFSET)
    }
}

/// Parse an integer, defaulting on absence or garbage and clamping to `min..=max`
pub fn parse_bounded(raw: Option<&str>, default: i64, min: i64, max: i64) -> i64 {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => default,
        Some(s) => s.parse::<i64>().map_or(default, |v| v.clamp(min, max)),
    }
}
