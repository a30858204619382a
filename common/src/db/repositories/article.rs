// Article repository implementation backed by PostgreSQL

use crate::db::DbPool;
use crate::errors::StoreError;
use crate::models::{Article, PublishedArticle};
use crate::store::{ArticleFilter, ArticleStore, DueCursor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

const ARTICLE_COLUMNS: &str = "id, title, body, status, scheduled_at, actual_published_at, \
                               created_at, updated_at";

/// Repository for article database operations
#[derive(Debug, Clone)]
pub struct ArticleRepository {
    pool: DbPool,
}

impl ArticleRepository {
    /// Create a new ArticleRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for ArticleRepository {
    /// Find one page of scheduled articles due at `now`
    ///
    /// Rows with a NULL `scheduled_at` are included after the due ones so the
    /// publisher can report them; they never satisfy the due comparison.
    /// Keyset paging on `(scheduled_at NULLS LAST, id)` resumes after `after`.
    #[instrument(skip(self))]
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: u32,
    ) -> Result<Vec<Article>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM articles
            WHERE status = 'scheduled'
              AND (scheduled_at IS NULL OR scheduled_at <= $1)
              AND (
                    $3::UUID IS NULL
                 OR ($2::TIMESTAMPTZ IS NOT NULL
                     AND (scheduled_at IS NULL OR (scheduled_at, id) > ($2, $3)))
                 OR ($2::TIMESTAMPTZ IS NULL AND scheduled_at IS NULL AND id > $3)
              )
            ORDER BY scheduled_at ASC NULLS LAST, id ASC
            LIMIT $4
            "#
        );

        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(now)
            .bind(after.and_then(|c| c.scheduled_at))
            .bind(after.map(|c| c.id))
            .bind(i64::from(limit))
            .fetch_all(self.pool.pool())
            .await?;

        tracing::debug!(count = articles.len(), "Found due article candidates");
        Ok(articles)
    }

    /// Conditional single-row update; the `status = 'scheduled'` guard makes
    /// concurrent callers race safely, exactly one of them gets the row back.
    #[instrument(skip(self))]
    async fn mark_published(
        &self,
        id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<Option<PublishedArticle>, StoreError> {
        let published = sqlx::query_as::<_, PublishedArticle>(
            r#"
            UPDATE articles
            SET status = 'published',
                actual_published_at = $2,
                updated_at = $2
            WHERE id = $1 AND status = 'scheduled'
            RETURNING id, title
            "#,
        )
        .bind(id)
        .bind(published_at)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(published)
    }

    #[instrument(skip(self, article), fields(article_id = %article.id))]
    async fn create(&self, article: &Article) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO articles (
                id, title, body, status, scheduled_at,
                actual_published_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(article.id)
        .bind(&article.title)
        .bind(&article.body)
        .bind(article.status.as_str())
        .bind(article.scheduled_at)
        .bind(article.actual_published_at)
        .bind(article.created_at)
        .bind(article.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(article_id = %article.id, status = %article.status, "Article created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>, StoreError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(article)
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM articles
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY scheduled_at ASC NULLS LAST, created_at ASC
            LIMIT $2
            "#
        );

        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(i64::from(filter.limit))
            .fetch_all(self.pool.pool())
            .await?;
        Ok(articles)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.pool.health_check().await.map_err(StoreError::from)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
