use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use parkcart_rs::{
    create_app, init_observability,
    observability::{CartOperationTracer, DatabaseTracingMiddleware, Metrics},
    repositories::{PostgresCartRepository, SchemaManager},
    services::CartService,
    shutdown_observability, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_environment().context("failed to load configuration")?;

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint(),
        config.observability.enable_json_logging,
        &config.observability.log_level,
    )?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );

    let metrics = Arc::new(Metrics::new()?);

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.database_url)
        .await
        .context("failed to connect to the cart database")?;
    info!(
        "Database pool ready with up to {} connections",
        config.database.max_connections
    );

    if config.database.ensure_schema {
        SchemaManager::new(pool.clone())
            .ensure_schema()
            .await
            .context("failed to create the cart schema")?;
    }

    let cart_repository = Arc::new(
        PostgresCartRepository::new(pool.clone())
            .with_tracing(DatabaseTracingMiddleware::new(metrics.clone())),
    );
    let cart_service = Arc::new(
        CartService::new(cart_repository).with_tracer(CartOperationTracer::new(metrics.clone())),
    );

    let app = create_app(cart_service, metrics, &config.server);

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("invalid listen host {}", config.server.host))?,
        config.server.port,
    );
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
    shutdown_observability().await;
}
