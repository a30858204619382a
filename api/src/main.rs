use anyhow::Result;
use std::net::SocketAddr;

mod handlers;
mod routes;
mod state;

use common::bootstrap;
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = bootstrap::load_settings()?;
    bootstrap::init_observability(&config)?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        backend = ?config.database.backend,
        "Starting API server"
    );

    let store = bootstrap::init_article_store(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize article store");
        e
    })?;
    let publisher = bootstrap::init_publisher(&config, store.clone());

    // Optional in-process trigger, for deployments without an external cron job
    let trigger = if config.scheduler.enabled {
        let handle = bootstrap::init_trigger(&config, publisher.clone())?.spawn();
        tracing::info!("In-process publication trigger started");
        Some(handle)
    } else {
        tracing::info!("In-process trigger disabled, expecting external calls to /api/publish-scheduled");
        None
    };

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let state = AppState::new(store.clone(), publisher, config);
    let app = routes::create_router(state);

    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = trigger {
        handle.stop().await;
    }
    store.close().await;
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
