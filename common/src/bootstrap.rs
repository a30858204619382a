// Bootstrap utilities for binary initialization
// Shared by the api and scheduler main.rs files

use crate::config::{Settings, StoreBackend};
use crate::db::{ArticleRepository, DbPool};
use crate::publisher::{PublishTrigger, Publisher};
use crate::store::{ArticleStore, InMemoryArticleStore};
use crate::telemetry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Load and validate settings from `config/` plus `APP__*` environment
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(settings)
}

/// Initialize logging, tracing export and metrics from settings
pub fn init_observability(settings: &Settings) -> Result<()> {
    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;

    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    Ok(())
}

/// Initialize database pool, applying migrations when configured
///
/// # Errors
/// Returns error if database pool initialization or migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    if settings.database.run_migrations {
        db_pool
            .migrate()
            .await
            .context("Failed to apply database migrations")?;
    }

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Build the article store selected by `database.backend`
#[tracing::instrument(skip(settings))]
pub async fn init_article_store(settings: &Settings) -> Result<Arc<dyn ArticleStore>> {
    match settings.database.backend {
        StoreBackend::Postgres => {
            let db_pool = init_database_pool(settings).await?;
            Ok(Arc::new(ArticleRepository::new(db_pool)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory article store; data is lost on restart");
            Ok(Arc::new(InMemoryArticleStore::new()))
        }
    }
}

pub fn init_publisher(settings: &Settings, store: Arc<dyn ArticleStore>) -> Arc<Publisher> {
    Arc::new(Publisher::new(store, settings.publisher.clone()))
}

/// Build the in-process trigger from `scheduler` settings
pub fn init_trigger(settings: &Settings, publisher: Arc<Publisher>) -> Result<PublishTrigger> {
    let schedule = settings
        .scheduler
        .trigger_schedule()
        .context("Invalid scheduler cadence")?;

    info!(
        schedule = ?schedule,
        run_timeout_seconds = settings.scheduler.run_timeout_seconds,
        "Publication trigger configured"
    );

    Ok(PublishTrigger::new(
        publisher,
        schedule,
        settings.scheduler.run_timeout(),
    ))
}
