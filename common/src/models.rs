use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Article Models
// ============================================================================

/// Article is a content record with a publication lifecycle
///
/// All timestamps are normalized to UTC before they reach this type.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub status: ArticleStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub actual_published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Build a new article in the given status
    ///
    /// A `Published` article gets `actual_published_at = now` so the
    /// "published iff actual_published_at is set" invariant holds from creation.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        status: ArticleStatus,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let actual_published_at = match status {
            ArticleStatus::Published => Some(now),
            _ => None,
        };

        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            status,
            scheduled_at,
            actual_published_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this article is due for automated publication at `now`
    ///
    /// Scheduled articles without a scheduled time are never due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ArticleStatus::Scheduled
            && self.scheduled_at.map(|at| at <= now).unwrap_or(false)
    }

    /// A scheduled article missing its scheduled time
    pub fn is_malformed(&self) -> bool {
        self.status == ArticleStatus::Scheduled && self.scheduled_at.is_none()
    }

    pub fn summary(&self) -> PublishedArticle {
        PublishedArticle {
            id: self.id,
            title: self.title.clone(),
        }
    }
}

/// ArticleStatus represents where an article is in its lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Scheduled,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Scheduled => "scheduled",
            ArticleStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ArticleStatus::Draft),
            "scheduled" => Ok(ArticleStatus::Scheduled),
            "published" => Ok(ArticleStatus::Published),
            _ => Err(format!("Invalid article status: {}", s)),
        }
    }
}

impl TryFrom<String> for ArticleStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

// ============================================================================
// Publication Models
// ============================================================================

/// Summary of an article transitioned by a publication run
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct PublishedArticle {
    pub id: Uuid,
    pub title: String,
}

/// Result of a single publication run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub published_count: usize,
    pub published_articles: Vec<PublishedArticle>,
    /// Due articles whose update failed this run; they stay scheduled
    pub failed_count: usize,
    /// Lost races and malformed records
    pub skipped_count: usize,
}

impl PublishReport {
    pub fn record_published(&mut self, article: PublishedArticle) {
        self.published_count += 1;
        self.published_articles.push(article);
    }

    pub fn message(&self) -> String {
        format!("Published {} scheduled articles", self.published_count)
    }
}

/// Snapshot of the scheduled queue used for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOverview {
    pub server_time: DateTime<Utc>,
    pub scheduled_count: usize,
    pub due_count: usize,
    pub malformed_count: usize,
    pub next_scheduled_at: Option<DateTime<Utc>>,
}

impl ScheduleOverview {
    /// Build an overview from the full set of scheduled articles
    pub fn from_scheduled(scheduled: &[Article], now: DateTime<Utc>) -> Self {
        let due_count = scheduled.iter().filter(|a| a.is_due(now)).count();
        let malformed_count = scheduled.iter().filter(|a| a.is_malformed()).count();
        let next_scheduled_at = scheduled
            .iter()
            .filter_map(|a| a.scheduled_at)
            .filter(|at| *at > now)
            .min();

        Self {
            server_time: now,
            scheduled_count: scheduled
                .iter()
                .filter(|a| a.status == ArticleStatus::Scheduled)
                .count(),
            due_count,
            malformed_count,
            next_scheduled_at,
        }
    }
}
