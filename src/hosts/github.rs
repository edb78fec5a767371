//! GitHub adapter
//!
//! Listings are JSON arrays; the next page is announced in the `Link` header.

use crate::config::{Host, Publisher};
use crate::hosts::{
    AdapterContext, CandidateSink, HostAdapter, NextPage, PaginationError, RepositoryEntry,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    full_name: String,
    #[serde(default)]
    default_branch: Option<String>,
    clone_url: String,
}

impl From<GitHubRepository> for RepositoryEntry {
    fn from(repo: GitHubRepository) -> Self {
        Self {
            name: repo.full_name,
            clone_url: repo.clone_url,
            branch: repo.default_branch,
        }
    }
}

pub struct GitHubAdapter {
    context: Arc<AdapterContext>,
}

impl GitHubAdapter {
    pub fn new(context: Arc<AdapterContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl HostAdapter for GitHubAdapter {
    async fn paginate(
        &self,
        host: &Arc<Host>,
        page_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<NextPage, PaginationError> {
        let headers = self.context.request_headers(host);
        let (repos, response) = self
            .context
            .fetch_json::<Vec<GitHubRepository>>(page_url, &headers)
            .await?;

        let count = repos.len();
        let entries = repos.into_iter().map(RepositoryEntry::from).collect();
        let sent = self
            .context
            .enqueue(host, publisher, entries, &headers, sink)
            .await;
        tracing::debug!("{}: {} repositories, {} enqueued", page_url, count, sent);

        Ok(match response.header("link").and_then(next_link) {
            Some(next) => NextPage::More(next),
            None => NextPage::Done,
        })
    }

    async fn enqueue_repository(
        &self,
        host: &Arc<Host>,
        repository_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<(), PaginationError> {
        let headers = self.context.request_headers(host);
        let (repo, _) = self
            .context
            .fetch_json::<GitHubRepository>(repository_url, &headers)
            .await?;

        self.context
            .enqueue(host, publisher, vec![repo.into()], &headers, sink)
            .await;
        Ok(())
    }
}

/// Extracts the `rel="next"` target of a `Link` header
///
/// # Examples
///
/// ```
/// use publiccode_crawler::hosts::next_link;
///
/// let header = r#"<https://api.github.com/x?page=2>; rel="next", <https://api.github.com/x?page=5>; rel="last""#;
/// assert_eq!(next_link(header).as_deref(), Some("https://api.github.com/x?page=2"));
/// ```
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });

        if !is_next {
            return None;
        }

        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}
