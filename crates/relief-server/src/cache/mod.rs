//! Conditional caching for read requests
//!
//! GET responses with status `200` receive a weak `ETag` derived from the
//! body, a `Cache-Control` directive chosen from the route shape, `Vary:
//! Accept-Encoding` and `Last-Modified`. A matching `If-None-Match` turns the
//! response into an empty `304`.

mod middleware;
mod policy;

pub use middleware::{CacheDecision, CacheMode, ConditionalCacheLayer, ConditionalCacheMiddleware};
pub use policy::{fingerprint, if_none_match_contains, CachePolicy};
