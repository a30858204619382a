// Configuration management with layered configuration (file, env)

use crate::schedule::{parse_cron_expression, parse_timezone, TriggerSchedule};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub publisher: PublisherConfig,
    pub scheduler: SchedulerConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout applied by the HTTP layer
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Postgres
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Rows fetched per due-article page; a run keeps paging until drained
    pub due_page_size: u32,
    /// How many conditional updates may be in flight at once
    pub max_concurrent_updates: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            due_page_size: 500,
            max_concurrent_updates: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the trigger inside the API process
    #[serde(default)]
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Cron expression with seconds; overrides `interval_seconds` when set
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub run_timeout_seconds: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let defaults = Config::try_from(&Settings::default())?;

        let builder = Config::builder()
            // Start with built-in defaults so partial files are enough
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if matches!(self.database.backend, StoreBackend::Postgres) {
            if self.database.url.is_empty() {
                return Err("Database URL cannot be empty".to_string());
            }
            if self.database.max_connections == 0 {
                return Err("Database max_connections must be greater than 0".to_string());
            }
        }

        if self.publisher.due_page_size == 0 {
            return Err("Publisher due_page_size must be greater than 0".to_string());
        }
        if self.publisher.max_concurrent_updates == 0 {
            return Err("Publisher max_concurrent_updates must be greater than 0".to_string());
        }

        if self.scheduler.interval_seconds == 0 {
            return Err("Scheduler interval_seconds must be greater than 0".to_string());
        }
        if self.scheduler.run_timeout_seconds == 0 {
            return Err("Scheduler run_timeout_seconds must be greater than 0".to_string());
        }
        if let Some(expression) = &self.scheduler.cron {
            parse_cron_expression(expression).map_err(|e| e.to_string())?;
        }
        parse_timezone(&self.scheduler.timezone).map_err(|e| e.to_string())?;

        Ok(())
    }
}

impl SchedulerConfig {
    /// Resolve the configured cadence into a trigger schedule
    pub fn trigger_schedule(&self) -> Result<TriggerSchedule, crate::errors::ScheduleError> {
        match &self.cron {
            Some(expression) => TriggerSchedule::cron(expression, &self.timezone),
            None => Ok(TriggerSchedule::interval(Duration::from_secs(
                self.interval_seconds,
            ))),
        }
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                request_timeout_seconds: default_request_timeout_seconds(),
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: "postgresql://localhost/newsroom".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
                run_migrations: false,
            },
            publisher: PublisherConfig::default(),
            scheduler: SchedulerConfig {
                enabled: false,
                // The external cron job fires every 5 minutes; match it
                interval_seconds: 300,
                cron: None,
                timezone: default_timezone(),
                run_timeout_seconds: 240,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: None,
                tracing_endpoint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_empty_database_url() {
        let mut settings = Settings::default();
        settings.database.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_memory_backend_does_not_need_url() {
        let mut settings = Settings::default();
        settings.database.backend = StoreBackend::Memory;
        settings.database.url = String::new();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_zero_port() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_bad_cron() {
        let mut settings = Settings::default();
        settings.scheduler.cron = Some("every five minutes".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_bad_timezone() {
        let mut settings = Settings::default();
        settings.scheduler.timezone = "Nowhere/Special".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cron_overrides_interval() {
        let mut settings = Settings::default();
        settings.scheduler.cron = Some("0 */5 * * * *".to_string());
        let schedule = settings.scheduler.trigger_schedule().unwrap();
        assert!(matches!(schedule, TriggerSchedule::Cron { .. }));
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[server]
port = 9191

[scheduler]
enabled = true
interval_seconds = 60
"#,
        )
        .unwrap();

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.server.port, 9191);
        assert!(settings.scheduler.enabled);
        assert_eq!(settings.scheduler.interval_seconds, 60);
        assert_eq!(settings.publisher.due_page_size, 500);
    }
}
