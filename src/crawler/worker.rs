//! Availability and persistence of repository candidates
//!
//! For every candidate a worker:
//! 1. Fetches the metadata file; any non-success answer means "no file"
//! 2. Parses it and checks it declares the publisher's code
//! 3. Saves the raw file and its fetch metadata
//! 4. Reads the commit history and scores the repository's activity
//! 5. Upserts the repository document into the run's generation, and an
//!    administration record for its code
//!
//! No outcome is fatal. The candidate's work guard is released when the
//! worker returns, whatever the outcome.

use crate::activity::{ActivityScorer, CommitSource};
use crate::crawler::coordinator::WorkItem;
use crate::crawler::HttpClient;
use crate::hosts::RepositoryCandidate;
use crate::index::{AdministrationDocument, RepositoryDocument, SearchIndex};
use crate::metrics::Metrics;
use crate::publiccode::{check_provenance, MetadataValidator, PublicCode};
use crate::storage::{FetchMetadata, FileKey, LocalStore};
use crate::url::repository_id;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Everything a worker needs, shared by all workers of a run
pub struct WorkerContext {
    pub http: Arc<dyn HttpClient>,
    pub validator: Arc<dyn MetadataValidator>,
    pub files: Arc<dyn LocalStore>,
    pub index: Arc<dyn SearchIndex>,
    pub commits: Arc<dyn CommitSource>,
    pub scorer: ActivityScorer,
    pub metrics: Arc<Metrics>,

    /// Index receiving this run's repository documents
    pub generation: String,
    pub administrations_index: String,
    pub file_name: String,
}

/// What happened to a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// No metadata file could be fetched
    Absent,
    /// The file was malformed or belongs to someone else
    Rejected,
    /// The file was valid but could not be stored or indexed
    PersistenceFailed,
    Indexed,
}

/// Consumes the candidate channel with at most `max_workers` concurrent workers
///
/// Returns once the channel is closed and every spawned worker has finished.
pub async fn run_worker_pool(
    mut receiver: mpsc::Receiver<WorkItem>,
    context: Arc<WorkerContext>,
    max_workers: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut workers = JoinSet::new();

    while let Some(item) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let context = Arc::clone(&context);

        workers.spawn(async move {
            let _permit = permit;
            let WorkItem { candidate, guard } = item;
            process_candidate(&context, &candidate).await;
            drop(guard);
        });

        // Reap finished workers so the set does not grow with the run
        while let Some(result) = workers.try_join_next() {
            log_join_error(result);
        }
    }

    while let Some(result) = workers.join_next().await {
        log_join_error(result);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!("Worker task failed: {}", e);
    }
}

/// Runs the availability and persistence pipeline for one candidate
pub async fn process_candidate(
    context: &WorkerContext,
    candidate: &RepositoryCandidate,
) -> WorkerOutcome {
    context.metrics.repository_processed();

    let response = match context
        .http
        .get(&candidate.file_url, &candidate.headers)
        .await
    {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            tracing::debug!(
                "No {} in {} (HTTP {})",
                context.file_name,
                candidate.name,
                response.status
            );
            return WorkerOutcome::Absent;
        }
        Err(e) => {
            tracing::debug!("No {} in {}: {}", context.file_name, candidate.name, e);
            return WorkerOutcome::Absent;
        }
    };

    let publiccode = match context.validator.parse(&response.body) {
        Ok(publiccode) => publiccode,
        Err(e) => {
            tracing::warn!("Invalid {} in {}: {}", context.file_name, candidate.name, e);
            context.metrics.validation_failed();
            return WorkerOutcome::Rejected;
        }
    };

    let code = match check_provenance(&publiccode, &candidate.publisher, &candidate.host) {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!("Rejected {}: {}", candidate.name, e);
            context.metrics.validation_failed();
            return WorkerOutcome::Rejected;
        }
    };

    let key = FileKey {
        host: candidate.hostname.clone(),
        organization: candidate.organization().replace('/', "%2F"),
        repository: candidate.repository().to_string(),
        generation: context.generation.clone(),
        file_name: context.file_name.clone(),
    };
    let metadata = FetchMetadata {
        url: candidate.file_url.clone(),
        status_code: response.status,
        content_type: response.header("content-type").map(str::to_string),
        fetched_at: Utc::now(),
        generation: context.generation.clone(),
    };

    match context.files.save(&key, &response.body, &metadata).await {
        Ok(path) => {
            tracing::debug!("Saved {} to {}", candidate.name, path.display());
            context.metrics.file_saved();
        }
        Err(e) => {
            tracing::warn!("Failed to save {}: {}", candidate.name, e);
            context.metrics.persistence_failed();
            return WorkerOutcome::PersistenceFailed;
        }
    }

    let now = Utc::now();
    let commits = match context
        .commits
        .commit_times(candidate, context.scorer.since(now))
        .await
    {
        Ok(commits) => commits,
        Err(e) => {
            tracing::warn!("No commit history for {}: {}", candidate.name, e);
            Vec::new()
        }
    };
    let activity = context.scorer.score(now, &commits);

    let document = match build_document(candidate, &publiccode, &code, context, activity) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Failed to build document for {}: {}", candidate.name, e);
            context.metrics.persistence_failed();
            return WorkerOutcome::PersistenceFailed;
        }
    };

    let upserted = serde_json::to_value(&document)
        .map_err(crate::index::IndexError::from)
        .and_then(|value| context.index.upsert(&context.generation, &document.id, &value));
    if let Err(e) = upserted {
        tracing::warn!("Failed to index {}: {}", candidate.name, e);
        context.metrics.persistence_failed();
        return WorkerOutcome::PersistenceFailed;
    }
    context.metrics.file_indexed();

    let administration = AdministrationDocument {
        code: code.clone(),
        name: candidate.publisher.name.clone(),
    };
    let upserted = serde_json::to_value(&administration)
        .map_err(crate::index::IndexError::from)
        .and_then(|value| {
            context
                .index
                .upsert(&context.administrations_index, &code.to_lowercase(), &value)
        });
    if let Err(e) = upserted {
        tracing::warn!("Failed to index administration {}: {}", code, e);
    }

    tracing::info!(
        "Indexed {} (activity {:.1})",
        candidate.name,
        document.vitality_score
    );
    WorkerOutcome::Indexed
}

fn build_document(
    candidate: &RepositoryCandidate,
    publiccode: &PublicCode,
    code: &str,
    context: &WorkerContext,
    activity: crate::activity::Activity,
) -> crate::UrlResult<RepositoryDocument> {
    Ok(RepositoryDocument {
        id: repository_id(&candidate.clone_url)?,
        repository: candidate.name.clone(),
        repository_url: candidate.clone_url.clone(),
        host: candidate.hostname.clone(),
        file_raw_url: candidate.file_url.clone(),
        crawl_time: Utc::now().to_rfc3339(),
        generation: context.generation.clone(),
        provenance_code: code.to_string(),
        publisher_name: candidate.publisher.name.clone(),
        name: publiccode.name.clone(),
        application_suite: publiccode.application_suite.clone(),
        url: publiccode.url.clone(),
        landing_url: publiccode.landing_url.clone(),
        is_based_on: publiccode.is_based_on.clone(),
        software_version: publiccode.software_version.clone(),
        release_date: publiccode.release_date.clone(),
        logo: publiccode.logo.clone(),
        monochrome_logo: publiccode.monochrome_logo.clone(),
        input_types: publiccode.input_types.clone(),
        output_types: publiccode.output_types.clone(),
        used_by: publiccode.used_by.clone(),
        roadmap: publiccode.roadmap.clone(),
        development_status: publiccode.development_status.clone(),
        software_type: publiccode.software_type.clone(),
        platforms: publiccode.platforms.clone(),
        categories: publiccode.categories.clone(),
        intended_audience: publiccode.intended_audience.clone(),
        description: publiccode.description.clone(),
        short_descriptions: publiccode.short_descriptions(),
        legal: publiccode.legal.clone(),
        maintenance: publiccode.maintenance.clone(),
        localisation: publiccode.localisation.clone(),
        depends_on: publiccode.depends_on.clone(),
        it: publiccode.it.clone(),
        vitality_score: activity.score,
        vitality_data_chart: activity.series,
    })
}
