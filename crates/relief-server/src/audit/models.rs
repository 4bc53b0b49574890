//! Request log records

use std::sync::LazyLock;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Identifier shape accepted as a `resource_id`
static RESOURCE_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9a-zA-Z-]{8,64}$").ok());

/// Row to insert into `request_logs`
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewRequestLog {
    pub method: String,
    /// Matched route pattern, or the raw path when no route matched
    pub path: String,
    pub query: Option<String>,
    pub ip: Option<String>,
    pub headers: JsonValue,
    pub status_code: i32,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub request_body: Option<JsonValue>,
    pub original_data: Option<JsonValue>,
    pub result_data: Option<JsonValue>,
    pub resource_id: Option<String>,
}

impl NewRequestLog {
    /// Append to the error text, joining with `"; "`
    pub fn push_error(&mut self, message: impl AsRef<str>) {
        match self.error {
            Some(ref mut existing) => {
                existing.push_str("; ");
                existing.push_str(message.as_ref());
            },
            None => self.error = Some(message.as_ref().to_string()),
        }
    }
}

/// Stored request log as returned by the admin listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestLogEntry {
    pub id: i64,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub ip: Option<String>,
    pub headers: Option<JsonValue>,
    pub status_code: i32,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub resource_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One stored request log including the captured bodies
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestLogDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: RequestLogEntry,
    pub request_body: Option<JsonValue>,
    pub original_data: Option<JsonValue>,
    pub result_data: Option<JsonValue>,
}

/// Captured body as stored: JSON when it parses, a JSON string otherwise, NULL when empty
pub fn json_or_null(bytes: &[u8]) -> Option<JsonValue> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<JsonValue>(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(JsonValue::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a char boundary
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One value per header name, each cut to `max_bytes`
pub fn header_snapshot(headers: &HeaderMap, max_bytes: usize) -> JsonValue {
    let mut snapshot = Map::new();
    for name in headers.keys() {
        if let Some(value) = headers.get(name) {
            let text = String::from_utf8_lossy(value.as_bytes());
            snapshot.insert(
                name.as_str().to_string(),
                JsonValue::String(truncate_utf8(&text, max_bytes).to_string()),
            );
        }
    }
    JsonValue::Object(snapshot)
}

/// Value of the `:id` segment of `route` when it looks like an identifier
pub fn resource_id(route: &str, path: &str) -> Option<String> {
    route
        .split('/')
        .zip(path.split('/'))
        .find(|(pattern, _)| *pattern == ":id")
        .map(|(_, value)| value)
        .filter(|value| RESOURCE_ID.as_ref().is_some_and(|re| re.is_match(value)))
        .map(str::to_string)
}
