// Error handling framework for the publication service

use thiserror::Error;

/// Schedule and trigger configuration errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Ambiguous local time '{0}' in the given timezone")]
    AmbiguousLocalTime(String),

    #[error("No next run time available for cron expression '{0}'")]
    NoNextRun(String),
}

/// Validation errors for authoring requests
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Article store errors
///
/// `Unavailable` means the store could not be reached at all, while
/// `QueryFailed` covers a single failed statement.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Article store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Store operation timed out: {0}")]
    Timeout(String),
}

/// Errors that abort a whole publication run
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to query due articles: {0}")]
    Store(#[from] StoreError),

    #[error("Publication run exceeded its deadline of {0} seconds")]
    DeadlineExceeded(u64),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        ApiError::new("VALIDATION_ERROR", err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new("VALIDATION_ERROR", err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::Unavailable(_) | StoreError::Timeout(_) => "STORE_UNAVAILABLE",
            _ => "STORE_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Store(store_err) => {
                let mut api_err = ApiError::from(store_err);
                if api_err.code == "STORE_ERROR" {
                    api_err.code = "STORE_UNAVAILABLE".to_string();
                }
                api_err
            }
            e @ PublishError::DeadlineExceeded(_) => ApiError::new("TIMEOUT", e.to_string()),
        }
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionFailed(err.to_string())
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionFailed(msg) | DatabaseError::HealthCheckFailed(msg) => {
                StoreError::Unavailable(msg)
            }
            DatabaseError::NotFound(msg) => StoreError::NotFound(msg),
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from(DatabaseError::from(err))
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::InvalidJson(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_error_display() {
        let err = ScheduleError::InvalidCronExpression {
            expression: "* * * *".to_string(),
            reason: "invalid format".to_string(),
        };
        assert!(err.to_string().contains("Invalid cron expression"));
    }

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let api_err: ApiError = StoreError::NotFound("abc".to_string()).into();
        assert_eq!(api_err.code, "NOT_FOUND");
    }

    #[test]
    fn test_publish_store_error_maps_to_unavailable() {
        let err = PublishError::Store(StoreError::QueryFailed("boom".to_string()));
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "STORE_UNAVAILABLE");
        assert!(api_err.message.contains("boom"));
    }

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_api_error_with_details() {
        let err = ApiError::new("TEST_ERROR", "Test message")
            .with_details(serde_json::json!({"field": "value"}));
        assert!(err.details.is_some());
    }
}
