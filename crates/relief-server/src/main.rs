//! Relief Server - Main entry point

use anyhow::Result;
use relief_common::logging::{init_logging, LogConfig};
use tracing::info;

use relief_server::{api, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("relief-server".to_string())
        .filter_directives("relief_server=debug,tower_http=debug,sqlx=warn".to_string())
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&log_config)?;

    info!("Starting Relief Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    api::serve(config).await
}
