//! Storage traits and error types
//!
//! This module defines the interfaces of the recovery store, the run log and
//! the local file store, and the errors they share.

use crate::storage::{FetchMetadata, FileKey, RunRecord, RunStatus};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable tracker of the pagination cursors currently in flight
///
/// Keys are `(host, owner, url)` triples, where the owner identifies one
/// pagination loop (publisher and organization). Two publishers listing the
/// same organization therefore never touch each other's cursors. Loops write
/// disjoint keys, so implementations only need to be safe for concurrent
/// use, not to order writes across hosts.
pub trait RecoveryStore: Send + Sync {
    /// Marks `url` as in progress for `owner` on `host`
    fn set(&self, host: &str, url: &str, owner: &str) -> StorageResult<()>;

    /// Lists every URL currently recorded for `host`
    fn keys(&self, host: &str) -> StorageResult<Vec<String>>;

    /// Removes the record of `owner` for `url` on `host`
    fn delete(&self, host: &str, url: &str, owner: &str) -> StorageResult<()>;

    /// The most recently recorded URL of `owner`, if its crawl was interrupted
    fn resume_point(&self, host: &str, owner: &str) -> StorageResult<Option<String>>;

    /// Forgets every checkpoint
    fn clear(&self) -> StorageResult<()>;
}

/// Log of crawl runs
pub trait RunLog: Send + Sync {
    /// Records the start of a run writing `generation`
    fn create_run(&self, generation: &str, config_hash: &str) -> StorageResult<i64>;

    /// Records the end of a run
    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        documents_indexed: u64,
        organizations_failed: u64,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// The most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}

/// Writer of raw metadata files and their fetch metadata
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Writes `body` and its sidecar under the directory derived from `key`
    ///
    /// Missing directories are created. Returns the path of the written file.
    async fn save(
        &self,
        key: &FileKey,
        body: &[u8],
        metadata: &FetchMetadata,
    ) -> StorageResult<PathBuf>;
}
