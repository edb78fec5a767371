//! Bitbucket Cloud adapter
//!
//! Listings are `{ "values": [...], "next": "..." }` objects; `next` is absent
//! on the last page.

use crate::config::{Host, Publisher};
use crate::hosts::{
    AdapterContext, CandidateSink, HostAdapter, NextPage, PaginationError, RepositoryEntry,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct BitbucketPage {
    #[serde(default)]
    values: Vec<BitbucketRepository>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BitbucketRepository {
    full_name: String,
    #[serde(default)]
    mainbranch: Option<BitbucketBranch>,
    links: BitbucketLinks,
}

#[derive(Debug, Deserialize)]
struct BitbucketBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketLinks {
    html: BitbucketLink,
}

#[derive(Debug, Deserialize)]
struct BitbucketLink {
    href: String,
}

impl From<BitbucketRepository> for RepositoryEntry {
    fn from(repo: BitbucketRepository) -> Self {
        // The https clone link embeds the account name; the html link clones too
        Self {
            name: repo.full_name,
            clone_url: repo.links.html.href,
            branch: repo.mainbranch.map(|b| b.name),
        }
    }
}

pub struct BitbucketAdapter {
    context: Arc<AdapterContext>,
}

impl BitbucketAdapter {
    pub fn new(context: Arc<AdapterContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl HostAdapter for BitbucketAdapter {
    async fn paginate(
        &self,
        host: &Arc<Host>,
        page_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<NextPage, PaginationError> {
        let headers = self.context.request_headers(host);
        let (page, _) = self
            .context
            .fetch_json::<BitbucketPage>(page_url, &headers)
            .await?;

        let count = page.values.len();
        let entries = page.values.into_iter().map(RepositoryEntry::from).collect();
        let sent = self
            .context
            .enqueue(host, publisher, entries, &headers, sink)
            .await;
        tracing::debug!("{}: {} repositories, {} enqueued", page_url, count, sent);

        Ok(match page.next.filter(|n| !n.is_empty()) {
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
            .fetch_json::<BitbucketRepository>(repository_url, &headers)
            .await?;

        self.context
            .enqueue(host, publisher, vec![repo.into()], &headers, sink)
            .await;
        Ok(())
    }
}
