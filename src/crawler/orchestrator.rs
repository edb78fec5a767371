//! Per-organization pagination loop
//!
//! For one organization the loop walks the listing pages of its host:
//!
//! 1. The first URL is checkpointed in the recovery store before it is fetched
//! 2. Every attempt waits for the host's rate limiter, then paginates
//! 3. A failed page is retried in place with exponential backoff; after the
//!    configured number of consecutive failures the organization is given up
//!    and its checkpoint is kept so the next run resumes there
//! 4. On success the next URL is checkpointed, then the previous one deleted
//! 5. When the adapter reports the last page, the checkpoint is deleted
//!
//! Recovery store failures are logged and never stop pagination.

use crate::config::{CrawlerConfig, Host, Publisher};
use crate::crawler::RateLimiter;
use crate::hosts::{CandidateSink, HostAdapter, NextPage, PaginationError};
use crate::storage::RecoveryStore;
use backon::{ExponentialBuilder, Retryable};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One organization (or single repository) to paginate
#[derive(Clone)]
pub struct OrganizationJob {
    pub host: Arc<Host>,
    pub adapter: Arc<dyn HostAdapter>,
    pub publisher: Arc<Publisher>,

    /// Whitelist URL of the organization
    pub organization: String,

    /// First URL to fetch: a resume point or the first listing page
    pub start_url: String,
}

impl OrganizationJob {
    /// Recovery store owner of this loop's cursors
    ///
    /// Scoped by publisher, since several publishers may list the same
    /// organization. Publishers without a code fall back to their name.
    pub fn cursor_owner(&self) -> String {
        let publisher = if self.publisher.code.is_empty() {
            &self.publisher.name
        } else {
            &self.publisher.code
        };
        format!("{} {}", publisher, self.organization)
    }
}

/// How an organization's pagination ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationOutcome {
    Completed { pages: u64 },

    /// The circuit breaker opened on `url`
    Failed { url: String, attempts: u32 },
}

/// Retry policy for failed pages
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,

    /// Consecutive failures of one page after which the organization fails
    pub max_consecutive_failures: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_backoff_ms),
            max: Duration::from_millis(config.max_backoff_ms),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }

    /// Exponential backoff allowing `max_consecutive_failures` attempts in total
    pub fn builder(&self) -> ExponentialBuilder {
        let retries = self.max_consecutive_failures.saturating_sub(1) as usize;
        ExponentialBuilder::default()
            .with_min_delay(self.initial)
            .with_max_delay(self.max)
            .with_max_times(retries)
            .with_jitter()
    }
}

/// Drives the pagination loops of a run
pub struct Orchestrator {
    recovery: Arc<dyn RecoveryStore>,
    limiter: Arc<RateLimiter>,
    backoff: BackoffPolicy,
}

impl Orchestrator {
    pub fn new(
        recovery: Arc<dyn RecoveryStore>,
        limiter: Arc<RateLimiter>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            recovery,
            limiter,
            backoff,
        }
    }

    /// Paginates one organization until its last page or until the breaker opens
    pub async fn crawl_organization(
        &self,
        job: &OrganizationJob,
        sink: &dyn CandidateSink,
    ) -> OrganizationOutcome {
        let host = &job.host;
        let mut url = job.start_url.clone();
        let mut pages = 0u64;

        let owner = job.cursor_owner();

        tracing::info!("Crawling {} from {}", job.organization, url);
        self.checkpoint(host, &url, &owner);

        loop {
            let attempts = AtomicU32::new(0);
            let result = self.fetch_page(job, &url, sink, &attempts).await;

            let next = match result {
                Ok(next) => next,
                Err(e) => {
                    let attempts = attempts.load(Ordering::SeqCst);
                    tracing::error!(
                        "Giving up on {} after {} consecutive failures: {}",
                        job.organization,
                        attempts,
                        e
                    );
                    return OrganizationOutcome::Failed { url, attempts };
                }
            };
            pages += 1;

            match next {
                NextPage::More(next_url) => {
                    self.checkpoint(host, &next_url, &owner);
                    self.forget(host, &url, &owner);
                    url = next_url;
                }
                NextPage::Done => {
                    self.forget(host, &url, &owner);
                    tracing::info!("Finished {} ({} pages)", job.organization, pages);
                    return OrganizationOutcome::Completed { pages };
                }
            }
        }
    }

    /// Fetches one page, retrying in place on failure
    async fn fetch_page(
        &self,
        job: &OrganizationJob,
        url: &str,
        sink: &dyn CandidateSink,
        attempts: &AtomicU32,
    ) -> Result<NextPage, PaginationError> {
        let limiter = self.limiter.as_ref();
        let host = &job.host;
        let adapter = job.adapter.as_ref();
        let publisher = &job.publisher;

        let attempt = move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            limiter.acquire(host).await;
            adapter.paginate(host, url, publisher, sink).await
        };

        attempt
            .retry(self.backoff.builder())
            .notify(|e: &PaginationError, delay: Duration| {
                tracing::warn!("{}; retrying in {:?}", e, delay);
            })
            .await
    }

    fn checkpoint(&self, host: &Host, url: &str, owner: &str) {
        if let Err(e) = self.recovery.set(&host.id, url, owner) {
            tracing::warn!("Failed to checkpoint {}: {}", url, e);
        }
    }

    fn forget(&self, host: &Host, url: &str, owner: &str) {
        if let Err(e) = self.recovery.delete(&host.id, url, owner) {
            tracing::warn!("Failed to delete checkpoint {}: {}", url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostKind;
    use crate::crawler::FetchError;
    use crate::hosts::testing::{test_host, test_publisher, CollectingSink};
    use crate::hosts::RepositoryCandidate;
    use crate::storage::{SqliteStorage, StorageResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Adapter replaying a fixed script of results
    struct ScriptedAdapter {
        script: Mutex<Vec<Result<NextPage, ()>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedAdapter {
        fn new(script: Vec<Result<NextPage, ()>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HostAdapter for ScriptedAdapter {
        async fn paginate(
            &self,
            host: &Arc<Host>,
            page_url: &str,
            publisher: &Arc<Publisher>,
            sink: &dyn CandidateSink,
        ) -> Result<NextPage, PaginationError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(page_url.to_string());
                calls.len()
            };
            let step = self.script.lock().unwrap().pop().unwrap_or(Ok(NextPage::Done));

            match step {
                Ok(next) => {
                    sink.send(RepositoryCandidate {
                        name: format!("org/{}", call),
                        hostname: host.id.clone(),
                        file_url: String::new(),
                        clone_url: String::new(),
                        branch: "main".to_string(),
                        publisher: Arc::clone(publisher),
                        host: Arc::clone(host),
                        headers: vec![],
                    })
                    .await
                    .unwrap();
                    Ok(next)
                }
                Err(()) => Err(PaginationError::new(
                    page_url,
                    FetchError::Status {
                        url: page_url.to_string(),
                        status: 503,
                    },
                )),
            }
        }

        async fn enqueue_repository(
            &self,
            _host: &Arc<Host>,
            _repository_url: &str,
            _publisher: &Arc<Publisher>,
            _sink: &dyn CandidateSink,
        ) -> Result<(), PaginationError> {
            Ok(())
        }
    }

    /// Recovery store recording every call
    struct RecordingStore {
        inner: SqliteStorage,
        log: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: SqliteStorage::new_in_memory().unwrap(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn store(&self) -> &SqliteStorage {
            &self.inner
        }
    }

    impl RecoveryStore for RecordingStore {
        fn set(&self, host: &str, url: &str, owner: &str) -> StorageResult<()> {
            self.log.lock().unwrap().push(format!("set {}", url));
            self.store().set(host, url, owner)
        }

        fn keys(&self, host: &str) -> StorageResult<Vec<String>> {
            self.store().keys(host)
        }

        fn delete(&self, host: &str, url: &str, owner: &str) -> StorageResult<()> {
            self.log.lock().unwrap().push(format!("delete {}", url));
            self.store().delete(host, url, owner)
        }

        fn resume_point(&self, host: &str, owner: &str) -> StorageResult<Option<String>> {
            self.store().resume_point(host, owner)
        }

        fn clear(&self) -> StorageResult<()> {
            self.store().clear()
        }
    }

    fn policy(max_failures: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(100),
            max_consecutive_failures: max_failures,
        }
    }

    fn job(adapter: Arc<ScriptedAdapter>) -> OrganizationJob {
        OrganizationJob {
            host: test_host(HostKind::GitHub, "https://api.example"),
            adapter,
            publisher: test_publisher(),
            organization: "https://github.com/org".to_string(),
            start_url: "https://api.example/p1".to_string(),
        }
    }

    fn more(url: &str) -> Result<NextPage, ()> {
        Ok(NextPage::More(url.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_stops_at_last_page() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            more("https://api.example/p2"),
            more("https://api.example/p3"),
            Ok(NextPage::Done),
            more("https://api.example/never"),
        ]));
        let store = Arc::new(RecordingStore::new());
        let orchestrator =
            Orchestrator::new(store.clone(), Arc::new(RateLimiter::new()), policy(10));
        let sink = CollectingSink::default();

        let outcome = orchestrator
            .crawl_organization(&job(adapter.clone()), &sink)
            .await;

        assert_eq!(outcome, OrganizationOutcome::Completed { pages: 3 });
        assert_eq!(
            adapter.calls(),
            vec![
                "https://api.example/p1",
                "https://api.example/p2",
                "https://api.example/p3"
            ]
        );
        assert_eq!(sink.candidates.lock().await.len(), 3);
        assert!(store.keys("github").unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_page_is_retried_in_place() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![Err(()), Err(()), Ok(NextPage::Done)]));
        let store = Arc::new(RecordingStore::new());
        let orchestrator =
            Orchestrator::new(store.clone(), Arc::new(RateLimiter::new()), policy(10));
        let sink = CollectingSink::default();

        let outcome = orchestrator
            .crawl_organization(&job(adapter.clone()), &sink)
            .await;

        assert_eq!(outcome, OrganizationOutcome::Completed { pages: 1 });
        assert_eq!(adapter.calls(), vec!["https://api.example/p1"; 3]);
        assert_eq!(
            store.log(),
            vec![
                "set https://api.example/p1".to_string(),
                "delete https://api.example/p1".to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_moves_before_previous_is_deleted() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            more("https://api.example/p2"),
            Ok(NextPage::Done),
        ]));
        let store = Arc::new(RecordingStore::new());
        let orchestrator =
            Orchestrator::new(store.clone(), Arc::new(RateLimiter::new()), policy(10));
        let sink = CollectingSink::default();

        orchestrator
            .crawl_organization(&job(adapter), &sink)
            .await;

        assert_eq!(
            store.log(),
            vec![
                "set https://api.example/p1".to_string(),
                "set https://api.example/p2".to_string(),
                "delete https://api.example/p1".to_string(),
                "delete https://api.example/p2".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_and_keeps_checkpoint() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            more("https://api.example/p2"),
            Err(()),
            Err(()),
            Err(()),
            Err(()),
        ]));
        let store = Arc::new(RecordingStore::new());
        let orchestrator =
            Orchestrator::new(store.clone(), Arc::new(RateLimiter::new()), policy(3));
        let sink = CollectingSink::default();

        let outcome = orchestrator
            .crawl_organization(&job(adapter.clone()), &sink)
            .await;

        assert_eq!(
            outcome,
            OrganizationOutcome::Failed {
                url: "https://api.example/p2".to_string(),
                attempts: 3
            }
        );
        assert_eq!(adapter.calls().len(), 4);
        assert_eq!(
            store
                .resume_point("github", "c_test https://github.com/org")
                .unwrap(),
            Some("https://api.example/p2".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_loop_keeps_other_publishers_cursor() {
        let store = Arc::new(RecordingStore::new());
        let other = OrganizationJob {
            publisher: Arc::new(Publisher {
                code: "c_other".to_string(),
                ..(*test_publisher()).clone()
            }),
            ..job(Arc::new(ScriptedAdapter::new(vec![])))
        };
        store
            .set("github", "https://api.example/p1", &other.cursor_owner())
            .unwrap();

        let adapter = Arc::new(ScriptedAdapter::new(vec![Ok(NextPage::Done)]));
        let orchestrator =
            Orchestrator::new(store.clone(), Arc::new(RateLimiter::new()), policy(3));
        let outcome = orchestrator
            .crawl_organization(&job(adapter), &CollectingSink::default())
            .await;

        assert_eq!(outcome, OrganizationOutcome::Completed { pages: 1 });
        assert_eq!(
            store.resume_point("github", &other.cursor_owner()).unwrap(),
            Some("https://api.example/p1".to_string())
        );
        assert_eq!(
            store
                .resume_point("github", "c_test https://github.com/org")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_policy_from_config() {
        let config = CrawlerConfig::default();
        let policy = BackoffPolicy::from_config(&config);
        assert_eq!(policy.initial, Duration::from_secs(1));
        assert_eq!(policy.max, Duration::from_secs(60));
        assert_eq!(policy.max_consecutive_failures, 10);
    }
}
