//! Commit history from local partial clones
//!
//! Repositories are cloned once under `root/<host>/<organization>/<repository>`
//! with `--filter=blob:none` (commits and trees only) and fetched on later
//! runs.

use crate::activity::{ActivityError, CommitSource};
use crate::hosts::RepositoryCandidate;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

const GIT_TIMEOUT: Duration = Duration::from_secs(300);

pub struct GitCommitSource {
    root: PathBuf,
}

impl GitCommitSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the clone of `candidate` lives
    pub fn clone_path(&self, candidate: &RepositoryCandidate) -> Result<PathBuf, ActivityError> {
        let mut path = self.root.join(sanitize(&candidate.hostname)?);
        for segment in candidate.name.split('/').filter(|s| !s.is_empty()) {
            path.push(sanitize(segment)?);
        }
        Ok(path)
    }

    /// Clones the repository, or fetches it if a clone exists
    async fn sync(&self, candidate: &RepositoryCandidate, path: &Path) -> Result<(), ActivityError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| ActivityError::InvalidPath(path.display().to_string()))?;

        if path.join(".git").exists() {
            let output = run_git(&[
                "-C",
                path_str,
                "fetch",
                "origin",
                candidate.branch.as_str(),
                "--filter=blob:none",
                "--prune",
                "--force",
            ])
            .await?;
            if output.status.success() {
                return Ok(());
            }

            tracing::warn!(
                "git fetch failed for {} ({}), re-cloning",
                candidate.name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            tokio::fs::remove_dir_all(path).await?;
        } else if path.exists() {
            tokio::fs::remove_dir_all(path).await?;
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::debug!("Cloning {} into {}", candidate.clone_url, path.display());
        let output = run_git(&[
            "clone",
            "--filter=blob:none",
            "--no-checkout",
            "--single-branch",
            "--branch",
            candidate.branch.as_str(),
            "--no-tags",
            candidate.clone_url.as_str(),
            path_str,
        ])
        .await?;
        check_output(&output, "clone")
    }
}

#[async_trait]
impl CommitSource for GitCommitSource {
    async fn commit_times(
        &self,
        candidate: &RepositoryCandidate,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, ActivityError> {
        let path = self.clone_path(candidate)?;
        self.sync(candidate, &path).await?;

        let path_str = path
            .to_str()
            .ok_or_else(|| ActivityError::InvalidPath(path.display().to_string()))?;
        let since_arg = format!("--since={}", since.timestamp());
        let output = run_git(&[
            "-C",
            path_str,
            "log",
            "FETCH_HEAD",
            "--format=%ct",
            since_arg.as_str(),
        ])
        .await?;

        // A fresh clone has no FETCH_HEAD; HEAD is the cloned branch
        let output = if output.status.success() {
            output
        } else {
            run_git(&["-C", path_str, "log", "HEAD", "--format=%ct", since_arg.as_str()]).await?
        };
        check_output(&output, "log")?;

        Ok(parse_commit_times(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses `git log --format=%ct` output, one unix timestamp per line
fn parse_commit_times(stdout: &str) -> Vec<DateTime<Utc>> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<i64>().ok())
        .filter_map(|secs| Utc.timestamp_opt(secs, 0).single())
        .collect()
}

fn sanitize(segment: &str) -> Result<&str, ActivityError> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
        return Err(ActivityError::InvalidPath(segment.to_string()));
    }
    Ok(segment)
}

fn check_output(output: &Output, operation: &str) -> Result<(), ActivityError> {
    if !output.status.success() {
        return Err(ActivityError::Git {
            operation: operation.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

async fn run_git(args: &[&str]) -> Result<Output, ActivityError> {
    let child = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ActivityError::Timeout(args.join(" "))),
    }
}
