// In-process publication trigger
//
// Runs the publisher on a fixed cadence as an explicitly owned task. The
// caller gets a `TriggerHandle`; stopping or dropping it ends the loop.

use super::engine::Publisher;
use crate::errors::PublishError;
use crate::models::PublishReport;
use crate::schedule::TriggerSchedule;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

/// Periodic invoker of the publisher
pub struct PublishTrigger {
    publisher: Arc<Publisher>,
    schedule: TriggerSchedule,
    run_timeout: Duration,
}

/// Owned handle to a running trigger
pub struct TriggerHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl TriggerHandle {
    /// Signal the loop to stop and wait for it to exit
    ///
    /// A run already in progress finishes (bounded by the run timeout)
    /// before the loop exits.
    pub async fn stop(self) {
        info!("Stopping publication trigger");
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            error!(error = %e, "Publication trigger task failed");
        }
        info!("Publication trigger stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl PublishTrigger {
    pub fn new(publisher: Arc<Publisher>, schedule: TriggerSchedule, run_timeout: Duration) -> Self {
        Self {
            publisher,
            schedule,
            run_timeout,
        }
    }

    /// Start the loop on the current tokio runtime
    pub fn spawn(self) -> TriggerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let join = tokio::spawn(self.run(shutdown_rx));
        TriggerHandle { shutdown_tx, join }
    }

    /// Run one publication bounded by the run timeout
    ///
    /// On timeout the in-flight run is dropped; transitions it already made
    /// stay in place and the rest are picked up next time.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<PublishReport, PublishError> {
        match timeout(self.run_timeout, self.publisher.publish_due_articles(None)).await {
            Ok(Ok(report)) => {
                if report.published_count > 0 || report.failed_count > 0 {
                    info!(
                        published_count = report.published_count,
                        failed_count = report.failed_count,
                        "Scheduled publication run completed"
                    );
                } else {
                    debug!("No articles due for publication");
                }
                Ok(report)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Scheduled publication run failed");
                Err(e)
            }
            Err(_) => {
                warn!(
                    run_timeout_seconds = self.run_timeout.as_secs(),
                    "Scheduled publication run abandoned after deadline"
                );
                Err(PublishError::DeadlineExceeded(self.run_timeout.as_secs()))
            }
        }
    }

    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(schedule = ?self.schedule, "Starting publication trigger");

        // Interval triggers fire right away; cron triggers wait for their slot
        let first = match &self.schedule {
            TriggerSchedule::Interval(_) => Ok(Utc::now()),
            TriggerSchedule::Cron { .. } => self.schedule.next_after(Utc::now()),
        };
        let mut next_fire = match first {
            Ok(at) => at,
            Err(e) => {
                error!(error = %e, "Cannot compute first trigger time");
                return;
            }
        };

        loop {
            let delay = (next_fire - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = sleep(delay) => {
                    let _ = self.run_once().await;

                    let now = Utc::now();
                    let following = self
                        .schedule
                        .next_after(next_fire)
                        .and_then(|at| if at < now { self.schedule.next_after(now) } else { Ok(at) });
                    next_fire = match following {
                        Ok(at) => at,
                        Err(e) => {
                            error!(error = %e, "Cannot compute next trigger time, stopping");
                            break;
                        }
                    };
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping publication trigger");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublisherConfig;
    use crate::errors::StoreError;
    use crate::models::{Article, ArticleStatus, PublishedArticle};
    use crate::store::{ArticleFilter, ArticleStore, DueCursor, InMemoryArticleStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use uuid::Uuid;

    fn due_article(title: &str) -> Article {
        let now = Utc::now();
        Article::new(
            title,
            "",
            ArticleStatus::Scheduled,
            Some(now - ChronoDuration::minutes(5)),
            now - ChronoDuration::hours(1),
        )
    }

    fn trigger_over(store: Arc<dyn ArticleStore>, period: Duration, run_timeout: Duration) -> PublishTrigger {
        let publisher = Arc::new(Publisher::new(store, PublisherConfig::default()));
        PublishTrigger::new(publisher, TriggerSchedule::interval(period), run_timeout)
    }

    /// Store whose due-set scan never finishes in time
    struct StalledStore;

    #[async_trait]
    impl ArticleStore for StalledStore {
        async fn find_due(
            &self,
            _now: DateTime<Utc>,
            _after: Option<DueCursor>,
            _limit: u32,
        ) -> Result<Vec<Article>, StoreError> {
            sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn mark_published(
            &self,
            _id: Uuid,
            _published_at: DateTime<Utc>,
        ) -> Result<Option<PublishedArticle>, StoreError> {
            Ok(None)
        }

        async fn create(&self, _article: &Article) -> Result<(), StoreError> {
            Ok(())
        }

        async fn find_by_id(&self, _id: Uuid) -> Result<Option<Article>, StoreError> {
            Ok(None)
        }

        async fn list(&self, _filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_once_publishes_due_articles() {
        let article = due_article("A");
        let store = InMemoryArticleStore::with_articles(vec![article.clone()]);
        let trigger = trigger_over(
            Arc::new(store.clone()),
            Duration::from_secs(300),
            Duration::from_secs(5),
        );

        let report = trigger.run_once().await.unwrap();
        assert_eq!(report.published_count, 1);
    }

    #[tokio::test]
    async fn test_run_once_respects_deadline() {
        let trigger = trigger_over(
            Arc::new(StalledStore),
            Duration::from_secs(300),
            Duration::from_millis(20),
        );

        let err = trigger.run_once().await.unwrap_err();
        assert!(matches!(err, PublishError::DeadlineExceeded(_)));
    }

    #[tokio::test]
    async fn test_spawned_trigger_publishes_and_stops() {
        let store = InMemoryArticleStore::with_articles(vec![due_article("A"), due_article("B")]);
        let handle = trigger_over(
            Arc::new(store.clone()),
            Duration::from_millis(20),
            Duration::from_secs(5),
        )
        .spawn();

        sleep(Duration::from_millis(100)).await;
        timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("trigger did not stop");

        let published = store
            .list(&ArticleFilter::with_status(ArticleStatus::Published))
            .await
            .unwrap();
        assert_eq!(published.len(), 2);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_wait() {
        let store = InMemoryArticleStore::new();
        let handle = trigger_over(
            Arc::new(store),
            Duration::from_secs(3600),
            Duration::from_secs(5),
        )
        .spawn();

        sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("trigger did not stop");
    }

    #[tokio::test]
    async fn test_article_scheduled_later_is_picked_up_by_later_run() {
        let now = Utc::now();
        let soon = Article::new(
            "soon",
            "",
            ArticleStatus::Scheduled,
            Some(now + ChronoDuration::milliseconds(60)),
            now,
        );
        let store = InMemoryArticleStore::with_articles(vec![soon.clone()]);
        let handle = trigger_over(
            Arc::new(store.clone()),
            Duration::from_millis(25),
            Duration::from_secs(5),
        )
        .spawn();

        sleep(Duration::from_millis(250)).await;
        handle.stop().await;

        let after = store.find_by_id(soon.id).await.unwrap().unwrap();
        assert_eq!(after.status, ArticleStatus::Published);
        assert!(after.actual_published_at.unwrap() >= soon.scheduled_at.unwrap());
    }
}
