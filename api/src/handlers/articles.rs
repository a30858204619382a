use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::errors::{ApiError, ValidationError};
use common::models::{Article, ArticleStatus};
use common::schedule::normalize_scheduled_at;
use common::store::ArticleFilter;

const MAX_LIST_LIMIT: u32 = 1000;

/// Request to create a new article
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Defaults to `scheduled` when `scheduledAt` is given, `draft` otherwise
    pub status: Option<ArticleStatus>,
    /// RFC3339 with offset, or a local time paired with `timezone`
    pub scheduled_at: Option<String>,
    /// IANA timezone name for a local `scheduledAt`
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    pub status: Option<ArticleStatus>,
    pub limit: Option<u32>,
}

impl CreateArticleRequest {
    /// Validate and normalize into a new article created at `now`
    fn into_article(self, now: chrono::DateTime<Utc>) -> Result<Article, ApiError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField("title".to_string()).into());
        }

        let scheduled_at = self
            .scheduled_at
            .as_deref()
            .map(|value| normalize_scheduled_at(value, self.timezone.as_deref()))
            .transpose()?;

        let status = self.status.unwrap_or(if scheduled_at.is_some() {
            ArticleStatus::Scheduled
        } else {
            ArticleStatus::Draft
        });

        if status == ArticleStatus::Scheduled && scheduled_at.is_none() {
            return Err(ValidationError::MissingField("scheduledAt".to_string()).into());
        }

        Ok(Article::new(title, self.body, status, scheduled_at, now))
    }
}

/// Create a new article
#[tracing::instrument(skip(state, req))]
pub async fn create_article(
    State(state): State<AppState>,
    Json(req): Json<CreateArticleRequest>,
) -> Result<(StatusCode, SuccessResponse<Article>), ErrorResponse> {
    let article = req.into_article(Utc::now())?;

    state.store.create(&article).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to create article");
        ErrorResponse::from(e)
    })?;

    tracing::info!(
        article_id = %article.id,
        status = %article.status,
        scheduled_at = ?article.scheduled_at,
        "Article created"
    );
    Ok((StatusCode::CREATED, SuccessResponse::new(article)))
}

/// Fetch a single article
#[tracing::instrument(skip(state))]
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SuccessResponse<Article>, ErrorResponse> {
    match state.store.find_by_id(id).await? {
        Some(article) => Ok(SuccessResponse::new(article)),
        None => Err(ErrorResponse::new(
            "not_found",
            format!("Article not found: {}", id),
        )),
    }
}

/// List articles, optionally by status
#[tracing::instrument(skip(state))]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<SuccessResponse<Vec<Article>>, ErrorResponse> {
    let filter = ArticleFilter {
        status: query.status,
        limit: query
            .limit
            .unwrap_or(ArticleFilter::default().limit)
            .clamp(1, MAX_LIST_LIMIT),
    };

    let articles = state.store.list(&filter).await?;
    Ok(SuccessResponse::new(articles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(status: Option<ArticleStatus>, scheduled_at: Option<&str>) -> CreateArticleRequest {
        CreateArticleRequest {
            title: "Morning brief".to_string(),
            body: String::new(),
            status,
            scheduled_at: scheduled_at.map(str::to_string),
            timezone: None,
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_scheduled_at_implies_scheduled() {
        let article = request(None, Some("2024-03-01T10:00:00Z"))
            .into_article(now())
            .unwrap();
        assert_eq!(article.status, ArticleStatus::Scheduled);
        assert!(article.actual_published_at.is_none());
    }

    #[test]
    fn test_scheduled_without_time_is_rejected() {
        let err = request(Some(ArticleStatus::Scheduled), None)
            .into_article(now())
            .unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_published_gets_publish_time() {
        let article = request(Some(ArticleStatus::Published), None)
            .into_article(now())
            .unwrap();
        assert_eq!(article.actual_published_at, Some(now()));
    }

    #[test]
    fn test_blank_title_is_rejected() {
        let mut req = request(None, None);
        req.title = "   ".to_string();
        assert!(req.into_article(now()).is_err());
    }

    #[test]
    fn test_local_time_with_timezone() {
        let mut req = request(None, Some("2024-03-01T17:00"));
        req.timezone = Some("Asia/Ho_Chi_Minh".to_string());
        let article = req.into_article(now()).unwrap();
        assert_eq!(
            article.scheduled_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }
}
