//! Relief Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the relief workspace.
//!
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Networking**: IP address and CIDR pattern matching for access lists
//! - **Errors**: shared error type and environment helpers
//!
//! # Example
//!
//! ```
//! use relief_common::net::IpPatternSet;
//!
//! let (allowed, rejected) = IpPatternSet::parse_list("10.0.0.0/8, 192.0.2.7");
//! assert!(rejected.is_empty());
//! assert!(allowed.contains("10.1.2.3".parse().unwrap()));
//! ```

pub mod error;
pub mod logging;
pub mod net;

pub use error::{ReliefError, Result};
