// Article store abstraction
//
// The publisher only talks to this trait. `mark_published` is the atomic
// compare-status-and-set the whole idempotency story rests on: it must only
// succeed while the stored status is still `scheduled`.

pub mod memory;

pub use memory::InMemoryArticleStore;

use crate::errors::StoreError;
use crate::models::{Article, ArticleStatus, PublishedArticle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Filter for listing articles
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub limit: u32,
}

impl Default for ArticleFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 100,
        }
    }
}

impl ArticleFilter {
    pub fn with_status(status: ArticleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Position just past the last row of a `find_due` page
///
/// Due rows are ordered by `scheduled_at` (missing times last), then `id`.
/// Paging by position rather than re-querying keeps rows that stay
/// `scheduled` after a failed update from being fetched again in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueCursor {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub id: Uuid,
}

impl DueCursor {
    pub fn after(article: &Article) -> Self {
        Self {
            scheduled_at: article.scheduled_at,
            id: article.id,
        }
    }
}

/// Persistent collection of articles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// One page of scheduled articles whose scheduled time is at or before `now`
    ///
    /// Scheduled records with no scheduled time are returned too, after the
    /// due ones, so callers can report them. Returns at most `limit` rows
    /// strictly after `after` in due order.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: u32,
    ) -> Result<Vec<Article>, StoreError>;

    /// Conditionally transition one article to published
    ///
    /// Sets status, `actual_published_at` and `updated_at` to `published_at`
    /// only if the current status is `scheduled`. Returns `None` when the
    /// condition did not hold (already published, not scheduled, or gone).
    async fn mark_published(
        &self,
        id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<Option<PublishedArticle>, StoreError>;

    async fn create(&self, article: &Article) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>, StoreError>;

    /// Articles ordered by scheduled time, then creation time
    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// Release connections on shutdown
    async fn close(&self) {}
}
