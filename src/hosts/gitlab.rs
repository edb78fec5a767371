//! GitLab adapter, for gitlab.com and self-managed instances
//!
//! Listings are JSON arrays paginated by a numeric `page` query parameter.
//! Group and project paths are passed URL-encoded (`group%2Fsub`).

use crate::config::{Host, Publisher};
use crate::hosts::{
    AdapterContext, CandidateSink, HostAdapter, NextPage, PaginationError, RepositoryEntry,
};
use crate::url::template::render;
use crate::UrlResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Deserialize)]
struct GitLabProject {
    path_with_namespace: String,
    #[serde(default)]
    default_branch: Option<String>,
    http_url_to_repo: String,
}

impl From<GitLabProject> for RepositoryEntry {
    fn from(project: GitLabProject) -> Self {
        Self {
            name: project.path_with_namespace,
            clone_url: project.http_url_to_repo,
            branch: project.default_branch,
        }
    }
}

pub struct GitLabAdapter {
    context: Arc<AdapterContext>,
}

impl GitLabAdapter {
    pub fn new(context: Arc<AdapterContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl HostAdapter for GitLabAdapter {
    fn listing_url(&self, host: &Host, organization: &str) -> UrlResult<String> {
        let org = encode_path(organization);
        render(&host.listing_url, &[("org", org.as_str()), ("page", "1")])
    }

    fn repository_url(&self, host: &Host, name: &str) -> UrlResult<String> {
        let name = encode_path(name);
        render(&host.repository_url, &[("name", name.as_str())])
    }

    async fn paginate(
        &self,
        host: &Arc<Host>,
        page_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<NextPage, PaginationError> {
        let headers = self.context.request_headers(host);
        let (projects, response) = self
            .context
            .fetch_json::<Vec<GitLabProject>>(page_url, &headers)
            .await?;

        if projects.is_empty() {
            return Ok(NextPage::Done);
        }

        let count = projects.len();
        let entries = projects.into_iter().map(RepositoryEntry::from).collect();
        let sent = self
            .context
            .enqueue(host, publisher, entries, &headers, sink)
            .await;
        tracing::debug!("{}: {} projects, {} enqueued", page_url, count, sent);

        // GitLab announces the next page number; an empty value means last page
        let next = match response.header("x-next-page").map(str::trim) {
            Some("") => None,
            Some(page) => page.parse::<u64>().ok().and_then(|n| with_page(page_url, n)),
            None => next_page_number(page_url).and_then(|n| with_page(page_url, n)),
        };

        Ok(match next {
            Some(url) => NextPage::More(url),
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
        let (project, _) = self
            .context
            .fetch_json::<GitLabProject>(repository_url, &headers)
            .await?;

        self.context
            .enqueue(host, publisher, vec![project.into()], &headers, sink)
            .await;
        Ok(())
    }
}

/// Encodes a namespaced path the way the GitLab API expects it
fn encode_path(path: &str) -> String {
    path.trim_matches('/').replace('/', "%2F")
}

/// The current `page` parameter plus one; a URL without one is page 1
fn next_page_number(url: &str) -> Option<u64> {
    let parsed = Url::parse(url).ok()?;
    let current = parsed
        .query_pairs()
        .find(|(k, _)| k == "page")
        .map(|(_, v)| v.parse::<u64>().ok())
        .unwrap_or(Some(1))?;
    Some(current + 1)
}

/// Replaces (or appends) the `page` query parameter
fn with_page(url: &str, page: u64) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = parsed.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        query.append_pair("page", &page.to_string());
    }

    Some(parsed.to_string())
}
