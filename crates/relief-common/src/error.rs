//! Error types shared across the relief workspace

use thiserror::Error;

use crate::net::IpPatternError;

/// Result type alias for shared helpers
pub type Result<T> = std::result::Result<T, ReliefError>;

#[derive(Error, Debug)]
pub enum ReliefError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable {key} has invalid value '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid IP pattern: {0}")]
    IpPattern(#[from] IpPatternError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read `key` from the environment, falling back to `default` when unset
///
/// A set but unparseable value is an error rather than a silent fallback.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ReliefError::InvalidEnv {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Boolean flag from the environment: `1/0`, `true/false`, `yes/no`, `on/off`
pub fn env_flag(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ReliefError::InvalidEnv {
                key: key.to_string(),
                value,
            }),
        },
        Err(_) => Ok(default),
    }
}
