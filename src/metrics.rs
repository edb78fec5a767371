//! Run counters
//!
//! Monotonic counters bumped by the pipeline at fixed points and summarized
//! in the log at the end of a run.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one crawl run
#[derive(Debug, Default)]
pub struct Metrics {
    repository_processed: AtomicU64,
    repository_file_saved: AtomicU64,
    repository_file_indexed: AtomicU64,
    validation_failed: AtomicU64,
    persistence_failed: AtomicU64,
    organizations_failed: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub repository_processed: u64,
    pub repository_file_saved: u64,
    pub repository_file_indexed: u64,
    pub validation_failed: u64,
    pub persistence_failed: u64,
    pub organizations_failed: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A candidate reached a worker
    pub fn repository_processed(&self) {
        self.repository_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A metadata file was written to local storage
    pub fn file_saved(&self) {
        self.repository_file_saved.fetch_add(1, Ordering::Relaxed);
    }

    /// A repository document was upserted
    pub fn file_indexed(&self) {
        self.repository_file_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn validation_failed(&self) {
        self.validation_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn persistence_failed(&self) {
        self.persistence_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn organization_failed(&self) {
        self.organizations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            repository_processed: self.repository_processed.load(Ordering::Relaxed),
            repository_file_saved: self.repository_file_saved.load(Ordering::Relaxed),
            repository_file_indexed: self.repository_file_indexed.load(Ordering::Relaxed),
            validation_failed: self.validation_failed.load(Ordering::Relaxed),
            persistence_failed: self.persistence_failed.load(Ordering::Relaxed),
            organizations_failed: self.organizations_failed.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repository_processed={} repository_file_saved={} repository_file_indexed={} \
             validation_failed={} persistence_failed={} organizations_failed={}",
            self.repository_processed,
            self.repository_file_saved,
            self.repository_file_indexed,
            self.validation_failed,
            self.persistence_failed,
            self.organizations_failed
        )
    }
}
