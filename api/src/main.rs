use anyhow::Result;
use std::net::SocketAddr;

mod handlers;
mod middleware;
mod routes;
mod state;

use common::config::Settings;
use common::engine::EngineClient;
use common::{bootstrap, telemetry};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load and validate configuration
    let config = Settings::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    // Structured logging, with optional OTLP span export
    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.tracing_endpoint.as_deref(),
    )?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting triage API server"
    );

    // Initialize database connection pool
    let db_pool = bootstrap::init_database_pool(&config).await?;

    if config.database.run_migrations {
        sqlx::migrate!("../migrations").run(db_pool.pool()).await?;
        tracing::info!("Database migrations applied");
    }

    if config.database.seed_reference_data {
        common::seed::seed_reference_data(&db_pool).await?;
    }

    // Initialize Redis client (callback rate limiting)
    let redis_client = bootstrap::init_redis_client(&config)?;

    // Initialize workflow engine client
    let engine = EngineClient::new(config.engine.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create engine client: {}", e))?;
    tracing::info!(base_url = %config.engine.base_url, "Workflow engine client initialized");

    // Initialize Prometheus metrics recorder
    let metrics_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    telemetry::describe_metrics();
    tracing::info!("Metrics recorder installed");

    // Create application state
    let state = AppState::new(db_pool, redis_client, engine, config.clone(), metrics_handle);

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry::shutdown_tracer();
    tracing::info!("API server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
