use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::handlers::ErrorResponse;
use crate::state::AppState;
use common::errors::ValidationError;
use common::models::{PublishReport, ScheduleOverview};

/// Optional body of the publish endpoint; unknown fields are ignored
#[derive(Debug, Default, Deserialize)]
pub struct PublishRequest {
    /// Evaluation time override; any RFC3339 offset, normalized to UTC
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: PublishReport,
}

fn parse_publish_request(body: &[u8]) -> Result<PublishRequest, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PublishRequest::default());
    }
    Ok(serde_json::from_slice(body)?)
}

/// Publish every scheduled article that is due
///
/// Invoked by the external cron job. Safe to call any number of times,
/// including concurrently.
#[tracing::instrument(skip(state, body))]
pub async fn publish_scheduled(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishResponse>, ErrorResponse> {
    let request = parse_publish_request(&body)?;

    let report = state
        .publisher
        .publish_due_articles(request.now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Publication run failed");
            ErrorResponse::from(e)
        })?;

    Ok(Json(PublishResponse {
        message: report.message(),
        report,
    }))
}

/// Diagnostics for the scheduled queue
#[tracing::instrument(skip(state))]
pub async fn publish_status(
    State(state): State<AppState>,
) -> Result<Json<ScheduleOverview>, ErrorResponse> {
    let overview = state.publisher.overview(None).await?;
    Ok(Json(overview))
}
