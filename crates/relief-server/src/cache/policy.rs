//! Cache-Control selection and body fingerprints

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::CacheConfig;

/// Query parameters that mark a paginated listing
const LIST_PARAMS: [&str; 4] = ["limit", "offset", "page", "per_page"];

/// Directive table keyed on route shape
#[derive(Debug, Clone)]
pub struct CachePolicy {
    list_max_age: u32,
    entity_max_age: u32,
    default_max_age: u32,
    realtime_routes: Vec<String>,
}

impl CachePolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            list_max_age: config.list_max_age,
            entity_max_age: config.entity_max_age,
            default_max_age: config.default_max_age,
            realtime_routes: config.realtime_routes.clone(),
        }
    }

    /// Cache-Control for a route pattern (or raw path) and query string
    pub fn directive(&self, route: &str, query: Option<&str>) -> String {
        if is_private_route(route) {
            return "no-store".to_string();
        }
        if self.realtime_routes.iter().any(|r| r == route) {
            return "no-cache".to_string();
        }
        if query.is_some_and(has_list_params) {
            return format!("public, max-age={}", self.list_max_age);
        }
        if has_trailing_identifier(route) {
            return format!("public, max-age={}", self.entity_max_age);
        }
        format!("public, max-age={}", self.default_max_age)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

fn is_private_route(route: &str) -> bool {
    route == "/_admin"
        || route.starts_with("/_admin/")
        || route == "/health"
        || route == "/healthz"
}

fn has_list_params(query: &str) -> bool {
    query
        .split('&')
        .filter_map(|pair| pair.split('=').next())
        .any(|key| LIST_PARAMS.contains(&key))
}

fn has_trailing_identifier(route: &str) -> bool {
    let Some(last) = route.trim_end_matches('/').rsplit('/').next() else {
        return false;
    };
    if last.is_empty() {
        return false;
    }
    last.starts_with(':')
        || Uuid::parse_str(last).is_ok()
        || last.bytes().all(|b| b.is_ascii_digit())
}

/// Weak ETag from the first 8 bytes of the body's SHA-256
pub fn fingerprint(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("W/\"{}\"", hex::encode(&digest[..8]))
}

/// True when a comma-separated `If-None-Match` value lists `etag`
pub fn if_none_match_contains(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|candidate| candidate == etag)
}
