//! Crawler module: the crawl pipeline
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`HttpClient`] seam
//! - Per-host rate limiting
//! - The per-organization pagination loop with checkpoints and backoff
//! - Completion tracking over producers and workers
//! - The bounded pool of availability and persistence workers
//! - Overall run coordination and generation publication

mod coordinator;
mod fetcher;
mod orchestrator;
mod rate_limiter;
mod worker;

pub use coordinator::{ChannelSink, Coordinator, WorkGuard, WorkItem, WorkTracker};
pub use fetcher::{
    build_http_client, FetchError, HttpClient, HttpResponse, ReqwestClient, DEFAULT_MAX_BODY_BYTES,
};
pub use orchestrator::{BackoffPolicy, Orchestrator, OrganizationJob, OrganizationOutcome};
pub use rate_limiter::RateLimiter;
pub use worker::{process_candidate, run_worker_pool, WorkerContext, WorkerOutcome};

use crate::activity::{ActivityScorer, CommitSource, GitCommitSource, NoHistory};
use crate::config::{Config, Host, Publisher};
use crate::hosts::{resolve, AdapterContext, AdapterRegistry, HostAdapter, RandomPicker};
use crate::index::{publish_generation, PublishOutcome, SearchIndex, SqliteIndex};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::publiccode::{BasicValidator, MetadataValidator};
use crate::storage::{FileStore, RecoveryStore, RunLog, RunStatus, SqliteStorage};
use crate::CrawlerError;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: i64,
    pub generation: String,
    pub organizations: usize,
    pub organizations_failed: u64,
    pub metrics: MetricsSnapshot,
    pub publication: PublishOutcome,
}

impl RunReport {
    pub fn published(&self) -> bool {
        self.publication.is_published()
    }
}

/// A crawl pipeline wired to its stores
///
/// Built from the configuration with [`Crawler::from_config`]; every
/// collaborator can be replaced before the run.
pub struct Crawler {
    config: Arc<Config>,
    config_hash: String,
    registry: AdapterRegistry,
    http: Arc<dyn HttpClient>,
    recovery: Arc<dyn RecoveryStore>,
    runs: Arc<dyn RunLog>,
    index: Arc<dyn SearchIndex>,
    files: Arc<dyn crate::storage::LocalStore>,
    validator: Arc<dyn MetadataValidator>,
    commits: Arc<dyn CommitSource>,
    limiter: Arc<RateLimiter>,
}

impl Crawler {
    /// Opens the stores named in `config` and builds the default adapters
    pub fn from_config(config: Config, config_hash: impl Into<String>) -> Result<Self, CrawlerError> {
        let storage = Arc::new(SqliteStorage::new(Path::new(&config.output.database_path))?);
        let index = Arc::new(SqliteIndex::new(Path::new(&config.output.index_path))?);
        let files = Arc::new(FileStore::new(&config.output.data_dir));
        let http: Arc<dyn HttpClient> = Arc::new(
            ReqwestClient::from_config(&config.user_agent)?
                .with_max_body_bytes(config.crawler.max_response_bytes),
        );

        let context = Arc::new(AdapterContext::new(
            Arc::clone(&http),
            Arc::new(RandomPicker),
            config.crawler.file_name.clone(),
        ));
        let registry = AdapterRegistry::with_defaults(context);

        let commits: Arc<dyn CommitSource> = if config.crawler.clone_repositories {
            Arc::new(GitCommitSource::new(&config.output.clone_dir))
        } else {
            Arc::new(NoHistory)
        };

        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            registry,
            http,
            recovery: storage.clone(),
            runs: storage,
            index,
            files,
            validator: Arc::new(BasicValidator),
            commits,
            limiter: Arc::new(RateLimiter::new()),
        })
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn with_commit_source(mut self, commits: Arc<dyn CommitSource>) -> Self {
        self.commits = commits;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn MetadataValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    pub fn run_log(&self) -> &Arc<dyn RunLog> {
        &self.runs
    }

    /// Forgets every stored checkpoint, so the next run starts from first pages
    pub fn clear_checkpoints(&self) -> Result<(), CrawlerError> {
        self.recovery.clear()?;
        tracing::info!("Cleared all checkpoints");
        Ok(())
    }

    /// Resolves every organization and repository of `publishers` to a job
    ///
    /// URLs no host matches are skipped with a warning. Organizations with a
    /// stored checkpoint resume from it.
    pub fn plan(&self, publishers: &[Publisher]) -> Vec<OrganizationJob> {
        let hosts: Vec<Arc<Host>> = self.config.hosts.iter().cloned().map(Arc::new).collect();
        let mut jobs = Vec::new();

        for publisher in publishers {
            let publisher = Arc::new(publisher.clone());

            for url in &publisher.organizations {
                let Some(target) = resolve(url, &hosts) else {
                    continue;
                };
                if let Some(adapter) = self.registry.get(target.host.kind) {
                    jobs.extend(self.job(url, &target.path, target.host, adapter, &publisher));
                } else {
                    tracing::warn!("No adapter registered for {}, skipping {}", target.host.kind, url);
                }
            }

            for url in &publisher.repositories {
                let Some(target) = resolve(url, &hosts) else {
                    continue;
                };
                if let Some(adapter) = self.registry.single_repository(target.host.kind) {
                    jobs.extend(self.job(url, &target.path, target.host, adapter, &publisher));
                } else {
                    tracing::warn!("No adapter registered for {}, skipping {}", target.host.kind, url);
                }
            }
        }

        jobs
    }

    fn job(
        &self,
        url: &str,
        path: &str,
        host: Arc<Host>,
        adapter: Arc<dyn HostAdapter>,
        publisher: &Arc<Publisher>,
    ) -> Option<OrganizationJob> {
        let mut job = OrganizationJob {
            host,
            adapter,
            publisher: Arc::clone(publisher),
            organization: url.to_string(),
            start_url: String::new(),
        };

        let resumed = match self.recovery.resume_point(&job.host.id, &job.cursor_owner()) {
            Ok(point) => point,
            Err(e) => {
                tracing::warn!("Cannot read checkpoint of {}: {}", url, e);
                None
            }
        };

        job.start_url = match resumed {
            Some(point) => {
                tracing::info!("Resuming {} from {}", url, point);
                point
            }
            None => match job.adapter.listing_url(&job.host, path) {
                Ok(first) => first,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", url, e);
                    return None;
                }
            },
        };

        Some(job)
    }

    /// Crawls every publisher into a new generation and publishes it
    ///
    /// Partial failures only make the generation less complete. The run fails
    /// only when its bookkeeping cannot be written or the live alias cannot be
    /// listed.
    pub async fn run(&self, publishers: &[Publisher]) -> Result<RunReport, CrawlerError> {
        let generation = Utc::now().timestamp_millis().to_string();
        let run_id = self.runs.create_run(&generation, &self.config_hash)?;
        tracing::info!("Starting run {} into generation {}", run_id, generation);

        let result = self.crawl_generation(run_id, &generation, publishers).await;

        if let Err(e) = &result {
            tracing::error!("Run {} failed: {}", run_id, e);
            if let Err(finish) = self.runs.finish_run(run_id, RunStatus::Failed, 0, 0) {
                tracing::error!("Failed to record the end of run {}: {}", run_id, finish);
            }
        }

        result
    }

    async fn crawl_generation(
        &self,
        run_id: i64,
        generation: &str,
        publishers: &[Publisher],
    ) -> Result<RunReport, CrawlerError> {
        self.index.create_index(generation)?;

        let metrics = Arc::new(Metrics::new());
        let crawler = &self.config.crawler;

        let context = Arc::new(WorkerContext {
            http: Arc::clone(&self.http),
            validator: Arc::clone(&self.validator),
            files: Arc::clone(&self.files),
            index: Arc::clone(&self.index),
            commits: Arc::clone(&self.commits),
            scorer: ActivityScorer::new(crawler.activity_window_days, crawler.activity_bucket_days),
            metrics: Arc::clone(&metrics),
            generation: generation.to_string(),
            administrations_index: self.config.index.administrations.clone(),
            file_name: crawler.file_name.clone(),
        });

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&self.recovery),
            Arc::clone(&self.limiter),
            BackoffPolicy::from_config(crawler),
        ));

        let (coordinator, receiver) = Coordinator::new(crawler.channel_capacity);
        let pool = tokio::spawn(run_worker_pool(
            receiver,
            context,
            crawler.max_concurrent_workers as usize,
        ));

        // Keeps the counter above zero until every producer is registered
        let root = coordinator.register();
        let jobs = self.plan(publishers);
        let organizations = jobs.len();
        tracing::info!("Crawling {} organizations and repositories", organizations);

        let mut producers = Vec::with_capacity(organizations);
        for job in jobs {
            let Some(sink) = coordinator.sink() else {
                break;
            };
            let guard = coordinator.register();
            let orchestrator = Arc::clone(&orchestrator);
            let metrics = Arc::clone(&metrics);

            producers.push(tokio::spawn(async move {
                let _guard = guard;
                let outcome = orchestrator.crawl_organization(&job, &sink).await;
                if matches!(outcome, OrganizationOutcome::Failed { .. }) {
                    metrics.organization_failed();
                }
            }));
        }
        drop(root);

        coordinator.wait_and_close().await;
        for producer in producers {
            if let Err(e) = producer.await {
                tracing::error!("Pagination task failed: {}", e);
            }
        }
        if let Err(e) = pool.await {
            tracing::error!("Worker pool failed: {}", e);
        }

        let snapshot = metrics.snapshot();
        tracing::info!("Run {} finished: {}", run_id, snapshot);

        let publication = publish_generation(self.index.as_ref(), &self.config.index.alias, generation)?;
        let status = if publication.is_published() {
            RunStatus::Completed
        } else {
            RunStatus::Unpublished
        };
        self.runs.finish_run(
            run_id,
            status,
            snapshot.repository_file_indexed,
            snapshot.organizations_failed,
        )?;

        Ok(RunReport {
            run_id,
            generation: generation.to_string(),
            organizations,
            organizations_failed: snapshot.organizations_failed,
            metrics: snapshot,
            publication,
        })
    }
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the run database, the search index and the file store
/// 2. Record a new run and its generation
/// 3. Paginate every organization and repository of the publishers
/// 4. Check, store and index every repository publishing a metadata file
/// 5. Move the live alias to the new generation
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `publishers` - The publishers to crawl
/// * `config_hash` - Hash of the configuration file, recorded with the run
///
/// # Returns
///
/// * `Ok(RunReport)` - The run finished (possibly with partial failures)
/// * `Err(CrawlerError)` - The run could not be carried out or published
pub async fn crawl(
    config: Config,
    publishers: &[Publisher],
    config_hash: &str,
) -> Result<RunReport, CrawlerError> {
    Crawler::from_config(config, config_hash)?.run(publishers).await
}
