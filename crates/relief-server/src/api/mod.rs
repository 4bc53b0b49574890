pub mod response;

use crate::access::{AccessGate, AccessGateLayer};
use crate::audit::AuditLayer;
use crate::cache::{CachePolicy, ConditionalCacheLayer};
use crate::config::Config;
use crate::{db, features, middleware};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub gate: AccessGate,
    pub config: Arc<Config>,
}

/// Connect, migrate, and serve until a shutdown signal arrives
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let db = db::create_pool(&config.database).await?;
    db::migrate(&db).await?;

    let gate = AccessGate::connect(&config.access, db.clone()).await;
    info!(
        denylist_entries = gate.denylist().current().len(),
        "Access gate ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let shutdown_timeout = config.server.shutdown_timeout_secs;
    let state = AppState {
        db,
        gate,
        config: Arc::new(config),
    };
    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Build the router with the full request pipeline
///
/// Outermost first: compression, request log, CORS, tracing, security
/// headers, conditional cache (GET), access gate (POST/PATCH), handler.
pub fn create_router(state: AppState) -> Router {
    let config = &state.config;

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .with_state(state.db.clone())
        .merge(features::router(state.db.clone()))
        .layer(AccessGateLayer::new(state.gate.clone()))
        .layer(ConditionalCacheLayer::new(
            CachePolicy::from_config(&config.cache),
            config.cache.max_body_bytes,
        ));

    for layer in middleware::security_header_layers() {
        router = router.layer(layer);
    }

    router
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
        .layer(AuditLayer::new(state.db.clone(), &config.audit))
        .layer(CompressionLayer::new())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Liveness plus database connectivity
async fn healthz(State(db): State<PgPool>) -> Result<Response, StatusCode> {
    match db::health_check(&db).await {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}

async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received terminate signal, starting graceful shutdown"),
    }

    // Give ongoing requests time to complete
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
