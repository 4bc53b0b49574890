//! Configuration management

use relief_common::error::{env_flag, env_or};
use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/relief";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

// ============================================================================
// Pipeline Constants
// ============================================================================

/// Deny-list snapshot lifetime before a background refresh is triggered.
pub const DEFAULT_DENYLIST_REFRESH_SECS: u64 = 60;

/// Deny-list load timeout in milliseconds.
pub const DEFAULT_DENYLIST_LOAD_TIMEOUT_MS: u64 = 1_000;

/// Largest GET body buffered for fingerprinting (512 KiB).
pub const DEFAULT_CACHE_MAX_BODY_BYTES: usize = 512 * 1024;

pub const DEFAULT_CACHE_LIST_MAX_AGE: u32 = 30;
pub const DEFAULT_CACHE_ENTITY_MAX_AGE: u32 = 60;
pub const DEFAULT_CACHE_DEFAULT_MAX_AGE: u32 = 30;

/// Routes served with `no-cache` because their aggregates move constantly.
pub const DEFAULT_CACHE_REALTIME_ROUTES: &str = "/supplies/:id/progress";

/// Per-header ceiling in the audit header snapshot (16 KiB).
pub const DEFAULT_AUDIT_MAX_HEADER_BYTES: usize = 16 * 1024;

/// Request/response body ceiling for audit capture (256 KiB).
pub const DEFAULT_AUDIT_MAX_BODY_BYTES: usize = 256 * 1024;

pub const DEFAULT_AUDIT_WRITE_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_AUDIT_MAX_CONCURRENT_WRITES: usize = 64;
pub const DEFAULT_AUDIT_PREIMAGE_TIMEOUT_MS: u64 = 1_000;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub access: AccessConfig,
    pub cache: CacheConfig,
    pub audit: AuditConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Admission rules for mutating requests
///
/// The allow-lists are fixed for the life of the process; the deny-list is
/// reloaded from `ip_denylist` every `denylist_refresh_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// IP/CIDR tokens; empty means any address is allowed
    pub allowed_ips: Vec<String>,
    /// ISO country codes, upper-cased; empty disables the country check
    pub allowed_countries: Vec<String>,
    pub allow_no_country: bool,
    pub denylist_refresh_secs: u64,
    pub denylist_load_timeout_ms: u64,
}

/// Conditional GET settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_body_bytes: usize,
    pub list_max_age: u32,
    pub entity_max_age: u32,
    pub default_max_age: u32,
    pub realtime_routes: Vec<String>,
}

/// Request log capture and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
    pub write_timeout_ms: u64,
    pub max_concurrent_writes: usize,
    pub preimage_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("RELIEF_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("RELIEF_PORT", DEFAULT_SERVER_PORT)?,
                shutdown_timeout_secs: env_or(
                    "RELIEF_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                )?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                )?,
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?,
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                )?,
            },
            cors: CorsConfig {
                allowed_origins: split_list(
                    &std::env::var("CORS_ALLOWED_ORIGINS")
                        .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string()),
                ),
                allow_credentials: env_flag("CORS_ALLOW_CREDENTIALS", false)?,
            },
            access: AccessConfig {
                allowed_ips: split_list(&std::env::var("ALLOWED_IPS").unwrap_or_default()),
                allowed_countries: split_list(
                    &std::env::var("ALLOWED_COUNTRIES").unwrap_or_default(),
                )
                .into_iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
                allow_no_country: env_flag("ALLOW_NO_COUNTRY", false)?,
                denylist_refresh_secs: env_or(
                    "DENYLIST_REFRESH_SECS",
                    DEFAULT_DENYLIST_REFRESH_SECS,
                )?,
                denylist_load_timeout_ms: env_or(
                    "DENYLIST_LOAD_TIMEOUT_MS",
                    DEFAULT_DENYLIST_LOAD_TIMEOUT_MS,
                )?,
            },
            cache: CacheConfig {
                max_body_bytes: env_or("CACHE_MAX_BODY_BYTES", DEFAULT_CACHE_MAX_BODY_BYTES)?,
                list_max_age: env_or("CACHE_LIST_MAX_AGE", DEFAULT_CACHE_LIST_MAX_AGE)?,
                entity_max_age: env_or("CACHE_ENTITY_MAX_AGE", DEFAULT_CACHE_ENTITY_MAX_AGE)?,
                default_max_age: env_or(
                    "CACHE_DEFAULT_MAX_AGE",
                    DEFAULT_CACHE_DEFAULT_MAX_AGE,
                )?,
                realtime_routes: split_list(
                    &std::env::var("CACHE_REALTIME_ROUTES")
                        .unwrap_or_else(|_| DEFAULT_CACHE_REALTIME_ROUTES.to_string()),
                ),
            },
            audit: AuditConfig {
                max_header_bytes: env_or(
                    "AUDIT_MAX_HEADER_BYTES",
                    DEFAULT_AUDIT_MAX_HEADER_BYTES,
                )?,
                max_body_bytes: env_or("AUDIT_MAX_BODY_BYTES", DEFAULT_AUDIT_MAX_BODY_BYTES)?,
                write_timeout_ms: env_or(
                    "AUDIT_WRITE_TIMEOUT_MS",
                    DEFAULT_AUDIT_WRITE_TIMEOUT_MS,
                )?,
                max_concurrent_writes: env_or(
                    "AUDIT_MAX_CONCURRENT_WRITES",
                    DEFAULT_AUDIT_MAX_CONCURRENT_WRITES,
                )?,
                preimage_timeout_ms: env_or(
                    "AUDIT_PREIMAGE_TIMEOUT_MS",
                    DEFAULT_AUDIT_PREIMAGE_TIMEOUT_MS,
                )?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        let wildcard = self.cors.allowed_origins.is_empty()
            || self.cors.allowed_origins.iter().any(|o| o == "*");
        if wildcard && self.cors.allow_credentials {
            anyhow::bail!("CORS_ALLOW_CREDENTIALS cannot be combined with a wildcard origin");
        }

        if self.access.denylist_refresh_secs == 0 {
            anyhow::bail!("DENYLIST_REFRESH_SECS must be greater than 0");
        }

        if self.access.denylist_load_timeout_ms == 0 {
            anyhow::bail!("DENYLIST_LOAD_TIMEOUT_MS must be greater than 0");
        }

        if self.cache.max_body_bytes == 0 {
            anyhow::bail!("CACHE_MAX_BODY_BYTES must be greater than 0");
        }

        if self.audit.max_concurrent_writes == 0 {
            anyhow::bail!("AUDIT_MAX_CONCURRENT_WRITES must be greater than 0");
        }

        if self.access.allowed_countries.is_empty() && self.access.allow_no_country {
            tracing::warn!("ALLOW_NO_COUNTRY has no effect without ALLOWED_COUNTRIES");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
            access: AccessConfig::default(),
            cache: CacheConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowed_ips: Vec::new(),
            allowed_countries: Vec::new(),
            allow_no_country: false,
            denylist_refresh_secs: DEFAULT_DENYLIST_REFRESH_SECS,
            denylist_load_timeout_ms: DEFAULT_DENYLIST_LOAD_TIMEOUT_MS,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_CACHE_MAX_BODY_BYTES,
            list_max_age: DEFAULT_CACHE_LIST_MAX_AGE,
            entity_max_age: DEFAULT_CACHE_ENTITY_MAX_AGE,
            default_max_age: DEFAULT_CACHE_DEFAULT_MAX_AGE,
            realtime_routes: split_list(DEFAULT_CACHE_REALTIME_ROUTES),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: DEFAULT_AUDIT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_AUDIT_MAX_BODY_BYTES,
            write_timeout_ms: DEFAULT_AUDIT_WRITE_TIMEOUT_MS,
            max_concurrent_writes: DEFAULT_AUDIT_MAX_CONCURRENT_WRITES,
            preimage_timeout_ms: DEFAULT_AUDIT_PREIMAGE_TIMEOUT_MS,
        }
    }
}

/// Split a comma-separated setting, dropping blank tokens
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const PIPELINE_VARS: &[&str] = &[
        "ALLOWED_IPS",
        "ALLOWED_COUNTRIES",
        "ALLOW_NO_COUNTRY",
        "CACHE_REALTIME_ROUTES",
        "AUDIT_MAX_CONCURRENT_WRITES",
        "RELIEF_PORT",
    ];

    fn clear_env() {
        for var in PIPELINE_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_split_list_skips_blanks() {
        assert_eq!(split_list(" a, ,b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.realtime_routes, vec!["/supplies/:id/progress"]);
        assert_eq!(config.audit.max_body_bytes, 256 * 1024);
    }

    #[test]
    fn test_access_defaults_give_denylist_time_to_load() {
        let access = AccessConfig::default();
        assert_eq!(access.denylist_refresh_secs, DEFAULT_DENYLIST_REFRESH_SECS);
        assert_eq!(access.denylist_load_timeout_ms, DEFAULT_DENYLIST_LOAD_TIMEOUT_MS);
        assert!(access.allowed_ips.is_empty());
        assert!(!access.allow_no_country);

        let mut config = Config::default();
        config.access.denylist_load_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_with_wildcard_rejected() {
        let mut config = Config::default();
        config.cors.allow_credentials = true;
        assert!(config.validate().is_err());

        config.cors.allowed_origins = vec!["https://relief.example.org".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_access_lists_from_env() {
        clear_env();
        std::env::set_var("ALLOWED_IPS", "10.0.0.0/8, ,203.0.113.7");
        std::env::set_var("ALLOWED_COUNTRIES", "tw, jp");
        std::env::set_var("ALLOW_NO_COUNTRY", "true");

        let config = Config::load().unwrap();
        assert_eq!(config.access.allowed_ips, vec!["10.0.0.0/8", "203.0.113.7"]);
        assert_eq!(config.access.allowed_countries, vec!["TW", "JP"]);
        assert!(config.access.allow_no_country);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_rejects_garbage_numbers() {
        clear_env();
        std::env::set_var("RELIEF_PORT", "eighty");
        assert!(Config::load().is_err());

        std::env::set_var("RELIEF_PORT", "8081");
        std::env::set_var("AUDIT_MAX_CONCURRENT_WRITES", "0");
        assert!(Config::load().is_err());

        clear_env();
    }
}
