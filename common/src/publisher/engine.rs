// Publisher engine: transitions due scheduled articles to published

use crate::config::PublisherConfig;
use crate::errors::{PublishError, StoreError};
use crate::models::{Article, ArticleStatus, PublishReport, ScheduleOverview};
use crate::store::{ArticleFilter, ArticleStore, DueCursor};
use crate::telemetry;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on rows scanned for the diagnostics overview
const OVERVIEW_SCAN_LIMIT: u32 = 10_000;

/// Publishes scheduled articles whose time has come
///
/// Holds no state between runs. Every transition goes through the store's
/// conditional `mark_published`, so any number of publishers may run at once
/// over the same store and each article is published exactly once.
pub struct Publisher {
    store: Arc<dyn ArticleStore>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(store: Arc<dyn ArticleStore>, config: PublisherConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.store
    }

    /// Publish every scheduled article with `scheduled_at <= now`
    ///
    /// `now` defaults to the current UTC time. Due rows are fetched in pages
    /// of `due_page_size` until the store runs dry. Only a failure of the
    /// initial query aborts the run; a failed later page ends the run early
    /// with what was published so far. A failed update is logged, counted in
    /// `failed_count` and left scheduled for the next run.
    #[instrument(skip(self))]
    pub async fn publish_due_articles(
        &self,
        now: Option<DateTime<Utc>>,
    ) -> Result<PublishReport, PublishError> {
        let now = now.unwrap_or_else(Utc::now);
        let started = Instant::now();
        let page_size = self.config.due_page_size.max(1);

        let mut report = PublishReport::default();
        let mut cursor: Option<DueCursor> = None;
        let mut due_total = 0usize;

        loop {
            let page = match self.store.find_due(now, cursor, page_size).await {
                Ok(page) => page,
                Err(e) if cursor.is_none() => {
                    error!(error = %e, "Failed to query due articles");
                    return Err(PublishError::Store(e));
                }
                Err(e) => {
                    error!(
                        error = %e,
                        published_count = report.published_count,
                        "Failed to query next page of due articles, remaining rows wait for the next run"
                    );
                    break;
                }
            };

            let exhausted = page.len() < page_size as usize;
            cursor = page.last().map(DueCursor::after);

            let due = self.select_due(page, now, &mut report);
            due_total += due.len();
            self.publish_page(due, now, &mut report).await;

            if exhausted {
                break;
            }
        }

        telemetry::update_due_backlog(due_total);
        telemetry::record_run_duration(started.elapsed().as_secs_f64());

        if due_total == 0 {
            debug!("No scheduled articles due");
            return Ok(report);
        }

        info!(
            due_count = due_total,
            published_count = report.published_count,
            failed_count = report.failed_count,
            skipped_count = report.skipped_count,
            "Publication run finished"
        );

        Ok(report)
    }

    /// Run the conditional updates for one page of due articles
    async fn publish_page(&self, due: Vec<Article>, now: DateTime<Utc>, report: &mut PublishReport) {
        if due.is_empty() {
            return;
        }

        debug!(due_count = due.len(), "Publishing due articles");

        let store = &self.store;
        let mut updates = stream::iter(due)
            .map(|article| async move {
                let outcome = store.mark_published(article.id, now).await;
                (article, outcome)
            })
            .buffer_unordered(self.config.max_concurrent_updates.max(1));

        while let Some((article, outcome)) = updates.next().await {
            match outcome {
                Ok(Some(published)) => {
                    info!(
                        article_id = %published.id,
                        title = %published.title,
                        scheduled_at = ?article.scheduled_at,
                        published_at = %now,
                        "Article published"
                    );
                    telemetry::record_article_published();
                    report.record_published(published);
                }
                Ok(None) => {
                    // Someone else won the conditional update
                    debug!(article_id = %article.id, "Article no longer scheduled, skipping");
                    report.skipped_count += 1;
                }
                Err(e) => {
                    error!(
                        article_id = %article.id,
                        error = %e,
                        "Failed to publish article, will retry next run"
                    );
                    telemetry::record_publish_failure(failure_reason(&e));
                    report.failed_count += 1;
                }
            }
        }
    }

    /// Keep only truly due articles and account for the rest
    fn select_due(
        &self,
        candidates: Vec<Article>,
        now: DateTime<Utc>,
        report: &mut PublishReport,
    ) -> Vec<Article> {
        let mut due = Vec::with_capacity(candidates.len());

        for article in candidates {
            if article.is_due(now) {
                due.push(article);
            } else if article.is_malformed() {
                warn!(
                    article_id = %article.id,
                    title = %article.title,
                    "Scheduled article has no scheduled time, not publishing"
                );
                report.skipped_count += 1;
            } else {
                debug!(
                    article_id = %article.id,
                    status = %article.status,
                    "Store returned an article that is not due, ignoring"
                );
            }
        }

        due
    }

    /// Diagnostics snapshot of the scheduled queue at `now`
    #[instrument(skip(self))]
    pub async fn overview(&self, now: Option<DateTime<Utc>>) -> Result<ScheduleOverview, StoreError> {
        let now = now.unwrap_or_else(Utc::now);
        let filter = ArticleFilter {
            status: Some(ArticleStatus::Scheduled),
            limit: OVERVIEW_SCAN_LIMIT,
        };
        let scheduled = self.store.list(&filter).await?;
        Ok(ScheduleOverview::from_scheduled(&scheduled, now))
    }
}

fn failure_reason(err: &StoreError) -> &'static str {
    match err {
        StoreError::Unavailable(_) => "unavailable",
        StoreError::Timeout(_) => "timeout",
        StoreError::QueryFailed(_) => "query_failed",
        StoreError::NotFound(_) => "not_found",
    }
}
