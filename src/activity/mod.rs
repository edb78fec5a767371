//! Repository activity scoring
//!
//! The scorer is a pure function of commit timestamps. Where those timestamps
//! come from is a [`CommitSource`]: a local partial clone, or nothing at all.

mod git;
mod scorer;

pub use git::GitCommitSource;
pub use scorer::{Activity, ActivityScorer};

use crate::hosts::RepositoryCandidate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while reading a repository's history
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("git {operation} failed: {message}")]
    Git { operation: String, message: String },

    #[error("git {0} timed out")]
    Timeout(String),

    #[error("invalid repository path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the commit times of a repository
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Commit times on the candidate's default branch since `since`
    async fn commit_times(
        &self,
        candidate: &RepositoryCandidate,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ActivityError>;
}

/// Source used when cloning is disabled: every history is empty
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

#[async_trait]
impl CommitSource for NoHistory {
    async fn commit_times(
        &self,
        _candidate: &RepositoryCandidate,
        _since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ActivityError> {
        Ok(Vec::new())
    }
}
