//! OctoCRM gateway server
//!
//! Main entry point for the HTTP API server.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::SystemClock;
use infrastructure::{AppConfig, AsyncDatabase, AsyncDatabaseConfig, LogFormat, init_tracing};
use presentation_http::{
    AppState, create_router,
    routes::cors_layer,
    tasks::{spawn_rate_limit_cleanup_task, spawn_session_cleanup_task},
};
use tokio::{net::TcpListener, signal};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;
    init_tracing(LogFormat::from_config(&config.server.log_format))?;
    config.validate()?;

    info!(
        host = %config.server.host,
        port = %config.server.port,
        rate_limit_enabled = config.rate_limit.enabled,
        "Starting OctoCRM gateway"
    );
    if config.admin_users.is_empty() {
        warn!("No admin users configured; admin login is disabled");
    }

    let db = AsyncDatabase::new(&AsyncDatabaseConfig::from_settings(&config.database)).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    let server_config = config.server.clone();
    let (state, usage_handle) = AppState::build(config, &db, Arc::new(SystemClock))?;

    let rate_limit_task = spawn_rate_limit_cleanup_task(
        state.rate_limiter.clone(),
        state.config.rate_limit.stale_after(),
        state.config.rate_limit.cleanup_interval(),
    );
    let session_task = spawn_session_cleanup_task(
        state.sessions.clone(),
        state.config.session.cleanup_interval(),
    );

    let app = create_router(state)?;

    // Add middleware (last added = outermost)
    let app = app.layer(RequestBodyLimitLayer::new(server_config.max_body_size_json_bytes));
    let app = match cors_layer(&server_config) {
        Some(cors) => app.layer(cors),
        None => {
            info!("CORS disabled");
            app
        },
    };
    let app = app.layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("🚀 Server listening on http://{}", addr);

    let shutdown_timeout = Duration::from_secs(server_config.shutdown_timeout_secs.unwrap_or(30));

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    rate_limit_task.abort();
    session_task.abort();

    // The router held the last usage recorder handle; let queued writes land
    if tokio::time::timeout(shutdown_timeout, usage_handle).await.is_err() {
        warn!("Timed out flushing API key usage records");
    }
    db.close().await;

    info!("👋 Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn shutdown_signal() {
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
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("📥 Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("📥 Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
