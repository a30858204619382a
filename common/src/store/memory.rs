// In-memory article store
//
// Backs local runs and tests. A single write lock around the map makes
// `mark_published` atomic with respect to concurrent publishers.

use super::{ArticleFilter, ArticleStore, DueCursor};
use crate::errors::StoreError;
use crate::models::{Article, ArticleStatus, PublishedArticle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct InMemoryArticleStore {
    articles: Arc<RwLock<HashMap<Uuid, Article>>>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `articles`
    pub fn with_articles(articles: impl IntoIterator<Item = Article>) -> Self {
        let map = articles.into_iter().map(|a| (a.id, a)).collect();
        Self {
            articles: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.articles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.articles.read().await.is_empty()
    }
}

fn schedule_order(a: &Article, b: &Article) -> std::cmp::Ordering {
    // Records without a scheduled time sort last
    match (a.scheduled_at, b.scheduled_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
    .then_with(|| a.created_at.cmp(&b.created_at))
}

/// Sort key of the due order: missing times last, then time, then id
fn due_key(scheduled_at: Option<DateTime<Utc>>, id: Uuid) -> (bool, Option<DateTime<Utc>>, Uuid) {
    (scheduled_at.is_none(), scheduled_at, id)
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    #[instrument(skip(self))]
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: u32,
    ) -> Result<Vec<Article>, StoreError> {
        let start = after.map(|c| due_key(c.scheduled_at, c.id));
        let articles = self.articles.read().await;
        let mut due: Vec<Article> = articles
            .values()
            .filter(|a| a.is_due(now) || a.is_malformed())
            .filter(|a| match &start {
                Some(start) => due_key(a.scheduled_at, a.id) > *start,
                None => true,
            })
            .cloned()
            .collect();
        due.sort_by_key(|a| due_key(a.scheduled_at, a.id));
        due.truncate(limit as usize);

        debug!(count = due.len(), "Found due article candidates");
        Ok(due)
    }

    #[instrument(skip(self))]
    async fn mark_published(
        &self,
        id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<Option<PublishedArticle>, StoreError> {
        let mut articles = self.articles.write().await;
        match articles.get_mut(&id) {
            Some(article) if article.status == ArticleStatus::Scheduled => {
                article.status = ArticleStatus::Published;
                article.actual_published_at = Some(published_at);
                article.updated_at = published_at;
                Ok(Some(article.summary()))
            }
            _ => Ok(None),
        }
    }

    async fn create(&self, article: &Article) -> Result<(), StoreError> {
        let mut articles = self.articles.write().await;
        if articles.contains_key(&article.id) {
            return Err(StoreError::QueryFailed(format!(
                "Article {} already exists",
                article.id
            )));
        }
        articles.insert(article.id, article.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>, StoreError> {
        Ok(self.articles.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
        let articles = self.articles.read().await;
        let mut listed: Vec<Article> = articles
            .values()
            .filter(|a| filter.status.map(|s| a.status == s).unwrap_or(true))
            .cloned()
            .collect();
        listed.sort_by(schedule_order);
        listed.truncate(filter.limit as usize);
        Ok(listed)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
