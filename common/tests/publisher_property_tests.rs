// Property-based tests for the scheduled article publisher

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::config::PublisherConfig;
use common::errors::StoreError;
use common::models::{Article, ArticleStatus, PublishedArticle};
use common::publisher::Publisher;
use common::store::{ArticleFilter, ArticleStore, DueCursor, InMemoryArticleStore};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap()
}

fn status_strategy() -> impl Strategy<Value = ArticleStatus> {
    prop_oneof![
        Just(ArticleStatus::Draft),
        Just(ArticleStatus::Scheduled),
        Just(ArticleStatus::Published),
    ]
}

/// Articles with scheduled times spread around `now()`, in minutes
fn articles_strategy() -> impl Strategy<Value = Vec<Article>> {
    prop::collection::vec((status_strategy(), -120i64..120i64), 0..30).prop_map(|rows| {
        rows
            .into_iter()
            .enumerate()
            .map(|(i, (status, offset))| {
                let scheduled_at = now() + Duration::minutes(offset);
                Article::new(
                    format!("article-{}", i),
                    "",
                    status,
                    Some(scheduled_at),
                    now() - Duration::days(1),
                )
            })
            .collect()
    })
}

fn due_ids(articles: &[Article]) -> HashSet<Uuid> {
    articles
        .iter()
        .filter(|a| a.is_due(now()))
        .map(|a| a.id)
        .collect()
}

fn paged(page_size: u32) -> PublisherConfig {
    PublisherConfig {
        due_page_size: page_size,
        ..PublisherConfig::default()
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Store whose conditional update fails once for selected articles
struct FlakyStore {
    inner: InMemoryArticleStore,
    fail_once: Mutex<HashSet<Uuid>>,
}

#[async_trait]
impl ArticleStore for FlakyStore {
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        after: Option<DueCursor>,
        limit: u32,
    ) -> Result<Vec<Article>, StoreError> {
        self.inner.find_due(now, after, limit).await
    }

    async fn mark_published(
        &self,
        id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<Option<PublishedArticle>, StoreError> {
        let fail = self.fail_once.lock().unwrap().remove(&id);
        if fail {
            return Err(StoreError::QueryFailed("write conflict".to_string()));
        }
        self.inner.mark_published(id, published_at).await
    }

    async fn create(&self, article: &Article) -> Result<(), StoreError> {
        self.inner.create(article).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
        self.inner.list(filter).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Exactly the due scheduled articles get published, once, whatever the page size
#[test]
fn property_publishes_exactly_the_due_set() {
    proptest!(|(articles in articles_strategy(), page_size in 1u32..8u32)| {
        let rt = runtime();
        let expected = due_ids(&articles);
        let store = InMemoryArticleStore::with_articles(articles.clone());
        let publisher = Publisher::new(Arc::new(store.clone()), paged(page_size));

        let report = rt.block_on(publisher.publish_due_articles(Some(now()))).unwrap();
        let published: HashSet<Uuid> = report.published_articles.iter().map(|a| a.id).collect();

        prop_assert_eq!(report.published_count, expected.len());
        prop_assert_eq!(&published, &expected);
        prop_assert_eq!(report.failed_count, 0);

        for original in &articles {
            let stored = rt.block_on(store.find_by_id(original.id)).unwrap().unwrap();
            if expected.contains(&original.id) {
                prop_assert_eq!(stored.status, ArticleStatus::Published);
                prop_assert_eq!(stored.actual_published_at, Some(now()));
            } else {
                prop_assert_eq!(stored.status, original.status);
                prop_assert_eq!(stored.actual_published_at, original.actual_published_at);
            }
        }

        let again = rt.block_on(publisher.publish_due_articles(Some(now()))).unwrap();
        prop_assert_eq!(again.published_count, 0);
    });
}

/// Failed updates are contained and picked up by the next run
#[test]
fn property_failed_updates_retry_next_run() {
    proptest!(|(
        articles in articles_strategy(),
        fail_mask in prop::collection::vec(any::<bool>(), 30),
        page_size in 1u32..8u32
    )| {
        let rt = runtime();
        let expected = due_ids(&articles);
        let failing: HashSet<Uuid> = articles
            .iter()
            .zip(fail_mask.iter())
            .filter(|(a, fail)| **fail && expected.contains(&a.id))
            .map(|(a, _)| a.id)
            .collect();

        let store = Arc::new(FlakyStore {
            inner: InMemoryArticleStore::with_articles(articles),
            fail_once: Mutex::new(failing.clone()),
        });
        let publisher = Publisher::new(store, paged(page_size));

        let first = rt.block_on(publisher.publish_due_articles(Some(now()))).unwrap();
        prop_assert_eq!(first.failed_count, failing.len());
        prop_assert_eq!(first.published_count, expected.len() - failing.len());

        let second = rt.block_on(publisher.publish_due_articles(Some(now()))).unwrap();
        let retried: HashSet<Uuid> = second.published_articles.iter().map(|a| a.id).collect();
        prop_assert_eq!(second.failed_count, 0);
        prop_assert_eq!(&retried, &failing);
    });
}

/// Overlapping runs never publish the same article twice
#[test]
fn property_concurrent_runs_publish_each_article_once() {
    proptest!(ProptestConfig::with_cases(32), |(
        articles in articles_strategy(),
        runs in 2usize..5usize
    )| {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        let expected = due_ids(&articles);
        let store: Arc<dyn ArticleStore> = Arc::new(InMemoryArticleStore::with_articles(articles));

        let reports = rt.block_on(async {
            let tasks: Vec<_> = (0..runs)
                .map(|_| {
                    let publisher = Publisher::new(store.clone(), PublisherConfig::default());
                    tokio::spawn(async move { publisher.publish_due_articles(Some(now())).await })
                })
                .collect();
            let mut reports = Vec::new();
            for task in tasks {
                reports.push(task.await.unwrap().unwrap());
            }
            reports
        });

        let mut seen = HashSet::new();
        for report in &reports {
            for article in &report.published_articles {
                prop_assert!(seen.insert(article.id), "article {} published twice", article.id);
            }
        }
        prop_assert_eq!(&seen, &expected);
    });
}
