// Scheduler binary entry point
//
// Runs only the publication trigger against the configured article store.
// Use this when no external cron job is calling the api's publish endpoint.

use common::bootstrap;
use common::telemetry;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = bootstrap::load_settings()?;
    bootstrap::init_observability(&settings)?;

    info!(
        backend = ?settings.database.backend,
        interval_seconds = settings.scheduler.interval_seconds,
        cron = ?settings.scheduler.cron,
        "Starting article publication scheduler"
    );

    let store = bootstrap::init_article_store(&settings).await.map_err(|e| {
        error!(error = %e, "Failed to initialize article store");
        e
    })?;

    let publisher = bootstrap::init_publisher(&settings, store.clone());
    let trigger = bootstrap::init_trigger(&settings, publisher)?;
    let handle = trigger.spawn();

    shutdown_signal().await;
    handle.stop().await;
    store.close().await;
    telemetry::shutdown_tracer();

    info!("Scheduler stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }

    info!("Initiating graceful shutdown");
}
