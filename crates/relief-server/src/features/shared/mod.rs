//! Shared utilities for feature modules
//!
//! - **pagination**: lenient `limit`/`offset` parsing
//! - **test_helpers**: inventory fixtures (test-only)

pub mod pagination;

#[cfg(test)]
pub mod test_helpers;

pub use pagination::{parse_bounded, PageParams};
