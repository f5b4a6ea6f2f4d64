use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;

mod handlers;
mod routes;
mod state;

use common::bootstrap;
use common::config::Settings;
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.tracing_endpoint.as_deref(),
    )?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting API server"
    );

    // Initialize Prometheus metrics recorder, rendered at /metrics
    let metrics_handle = telemetry::install_metrics_recorder()?;

    // Connect the durable store and fast cache and restore timers
    let runtime = bootstrap::init_runtime(&config).await?;
    let service = runtime.service.clone();

    // Periodic retention sweep
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let retention = service.retention();
    let sweep_interval = Duration::from_secs(config.scheduler.sweep_interval_seconds);
    let retention_task = tokio::spawn(async move {
        retention.run(sweep_interval, shutdown_rx).await;
    });

    // Trail of background firing failures
    let mut failures = service.subscribe_failures();
    tokio::spawn(async move {
        loop {
            match failures.recv().await {
                Ok(failure) => tracing::warn!(
                    trigger_id = %failure.trigger_id,
                    occurred_at = %failure.occurred_at,
                    error = %failure.error,
                    "Scheduled firing failed"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Fire failure listener lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Create application state and router
    let state = AppState::new(service.clone(), config.clone())
        .with_backends(runtime.db_pool.clone(), runtime.redis.clone())
        .with_metrics(metrics_handle);
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

    // Stop background work
    let _ = shutdown_tx.send(());
    if let Err(e) = retention_task.await {
        tracing::warn!(error = %e, "Retention loop ended abnormally");
    }
    service.shutdown().await;
    runtime.db_pool.close().await;
    telemetry::shutdown_tracer();

    tracing::info!("API server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
