//! Adapter crawling exactly one repository
//!
//! Used for the individual repository URLs a publisher lists. The "page" is
//! the repository's API URL and pagination always ends after it.

use crate::config::{Host, Publisher};
use crate::hosts::{CandidateSink, HostAdapter, NextPage, PaginationError};
use crate::UrlResult;
use async_trait::async_trait;
use std::sync::Arc;

pub struct SingleRepositoryAdapter {
    inner: Arc<dyn HostAdapter>,
}

impl SingleRepositoryAdapter {
    pub fn new(inner: Arc<dyn HostAdapter>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl HostAdapter for SingleRepositoryAdapter {
    /// The "listing" of a single repository is its API URL
    fn listing_url(&self, host: &Host, name: &str) -> UrlResult<String> {
        self.inner.repository_url(host, name)
    }

    fn repository_url(&self, host: &Host, name: &str) -> UrlResult<String> {
        self.inner.repository_url(host, name)
    }

    async fn paginate(
        &self,
        host: &Arc<Host>,
        page_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<NextPage, PaginationError> {
        self.inner
            .enqueue_repository(host, page_url, publisher, sink)
            .await?;
        Ok(NextPage::Done)
    }

    async fn enqueue_repository(
        &self,
        host: &Arc<Host>,
        repository_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<(), PaginationError> {
        self.inner
            .enqueue_repository(host, repository_url, publisher, sink)
            .await
    }
}
