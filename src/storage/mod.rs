//! Storage module for persisting crawl state and fetched files
//!
//! This module handles:
//! - The recovery store of in-flight pagination cursors (SQLite)
//! - The log of crawl runs (SQLite)
//! - Writing fetched metadata files and their fetch metadata to disk

mod local;
mod schema;
mod sqlite;
mod traits;

pub use local::FileStore;
pub use sqlite::SqliteStorage;
pub use traits::{LocalStore, RecoveryStore, RunLog, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Value recorded for a cursor whose page is being attempted
pub const CHECKPOINT_IN_PROGRESS: &str = "in-progress";

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub generation: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub documents_indexed: i64,
    pub organizations_failed: i64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but the new generation could not be made live
    Unpublished,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Unpublished => "unpublished",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "unpublished" => Some(Self::Unpublished),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Where a fetched file is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKey {
    pub host: String,
    pub organization: String,
    pub repository: String,
    pub generation: String,
    pub file_name: String,
}

/// Information about the fetch that produced a saved file
#[derive(Debug, Clone, Serialize)]
pub struct FetchMetadata {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub generation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Unpublished,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            assert_eq!(Some(*status), RunStatus::from_db_string(db_str));
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }
}
