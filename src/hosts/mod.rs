//! Hosting platform adapters
//!
//! Every supported platform exposes a different paginated listing API. An
//! adapter turns one listing page into [`RepositoryCandidate`]s pushed onto a
//! [`CandidateSink`] and tells the caller where the next page is.
//!
//! Adapters are looked up through an [`AdapterRegistry`] built at startup.

mod bitbucket;
mod credentials;
mod github;
mod gitlab;
mod resolver;
mod single;

pub use bitbucket::BitbucketAdapter;
pub use credentials::{CredentialPicker, FixedPicker, RandomPicker};
pub use github::{next_link, GitHubAdapter};
pub use gitlab::GitLabAdapter;
pub use resolver::{resolve, well_known_host, ResolvedTarget};
pub use single::SingleRepositoryAdapter;

use crate::config::{Host, HostKind, Publisher};
use crate::crawler::{FetchError, HttpClient, HttpResponse};
use crate::url::template::render;
use crate::UrlResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A repository that may publish a metadata file
///
/// Created by an adapter, consumed exactly once by a worker.
#[derive(Debug, Clone)]
pub struct RepositoryCandidate {
    /// Full name, `organization/repository`
    pub name: String,
    pub hostname: String,

    /// Direct URL of the metadata file on the default branch
    pub file_url: String,
    pub clone_url: String,
    pub branch: String,
    pub publisher: Arc<Publisher>,
    pub host: Arc<Host>,

    /// Headers the file is fetched with (e.g. the chosen credential)
    pub headers: Vec<(String, String)>,
}

impl RepositoryCandidate {
    /// Everything before the last path segment of the full name
    pub fn organization(&self) -> &str {
        self.name.rsplit_once('/').map(|(org, _)| org).unwrap_or("")
    }

    /// Last path segment of the full name
    pub fn repository(&self) -> &str {
        self.name
            .rsplit_once('/')
            .map(|(_, repo)| repo)
            .unwrap_or(&self.name)
    }
}

/// Where pagination goes after a successful page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    More(String),
    Done,
}

/// A failed page, carrying the URL to retry
///
/// The retry URL is always the URL that failed; adapters never advance on
/// failure.
#[derive(Debug, Error)]
#[error("page {retry_url} failed: {source}")]
pub struct PaginationError {
    pub retry_url: String,
    #[source]
    pub source: FetchError,
}

impl PaginationError {
    pub fn new(retry_url: &str, source: FetchError) -> Self {
        Self {
            retry_url: retry_url.to_string(),
            source,
        }
    }
}

/// The candidate channel was closed while a producer was still sending
#[derive(Debug, Error)]
#[error("candidate channel closed")]
pub struct SinkClosed;

/// Receives the candidates produced by adapters
#[async_trait]
pub trait CandidateSink: Send + Sync {
    async fn send(&self, candidate: RepositoryCandidate) -> Result<(), SinkClosed>;
}

/// Pagination protocol of one hosting platform
#[async_trait]
pub trait HostAdapter: Send + Sync {
    /// First listing page of an organization
    fn listing_url(&self, host: &Host, organization: &str) -> UrlResult<String> {
        render(&host.listing_url, &[("org", organization), ("page", "1")])
    }

    /// API URL of a single repository
    fn repository_url(&self, host: &Host, name: &str) -> UrlResult<String> {
        render(&host.repository_url, &[("name", name)])
    }

    /// Fetches one listing page, enqueues its repositories and returns the next page
    async fn paginate(
        &self,
        host: &Arc<Host>,
        page_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<NextPage, PaginationError>;

    /// Fetches one repository's API record and enqueues it
    async fn enqueue_repository(
        &self,
        host: &Arc<Host>,
        repository_url: &str,
        publisher: &Arc<Publisher>,
        sink: &dyn CandidateSink,
    ) -> Result<(), PaginationError>;
}

/// What every adapter needs to talk to a platform
pub struct AdapterContext {
    pub http: Arc<dyn HttpClient>,
    pub picker: Arc<dyn CredentialPicker>,

    /// Metadata file looked up in every repository
    pub file_name: String,
}

/// A repository entry decoded from a platform listing
#[derive(Debug, Clone)]
pub(crate) struct RepositoryEntry {
    pub name: String,
    pub clone_url: String,
    pub branch: Option<String>,
}

impl AdapterContext {
    pub fn new(
        http: Arc<dyn HttpClient>,
        picker: Arc<dyn CredentialPicker>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            picker,
            file_name: file_name.into(),
        }
    }

    /// Headers for one request: the `Authorization` credential, if any
    pub fn request_headers(&self, host: &Host) -> Vec<(String, String)> {
        self.picker
            .pick(host.credentials.len())
            .and_then(|i| host.credentials.get(i))
            .map(|credential| vec![("Authorization".to_string(), credential.clone())])
            .unwrap_or_default()
    }

    /// GETs `url` and decodes its JSON body
    ///
    /// Transport errors, non-success statuses and undecodable bodies all map to
    /// a [`PaginationError`] pointing back at `url`.
    pub(crate) async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<(T, HttpResponse), PaginationError> {
        let response = self
            .http
            .get(url, headers)
            .await
            .map_err(|e| PaginationError::new(url, e))?;

        if !response.is_success() {
            return Err(PaginationError::new(
                url,
                FetchError::Status {
                    url: url.to_string(),
                    status: response.status,
                },
            ));
        }

        let decoded = serde_json::from_slice(&response.body).map_err(|e| {
            PaginationError::new(
                url,
                FetchError::Decode {
                    url: url.to_string(),
                    message: e.to_string(),
                },
            )
        })?;

        Ok((decoded, response))
    }

    /// Turns entries into candidates and sends them, skipping empty repositories
    ///
    /// Returns the number of candidates sent.
    pub(crate) async fn enqueue(
        &self,
        host: &Arc<Host>,
        publisher: &Arc<Publisher>,
        entries: Vec<RepositoryEntry>,
        headers: &[(String, String)],
        sink: &dyn CandidateSink,
    ) -> usize {
        let mut sent = 0;

        for entry in entries {
            // No default branch: the repository has no commits
            let Some(branch) = entry.branch.filter(|b| !b.is_empty()) else {
                tracing::debug!("Skipping {}: no default branch", entry.name);
                continue;
            };

            let file_url = match render(
                &host.raw_url,
                &[
                    ("name", entry.name.as_str()),
                    ("branch", branch.as_str()),
                    ("file", self.file_name.as_str()),
                ],
            ) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", entry.name, e);
                    continue;
                }
            };

            let candidate = RepositoryCandidate {
                name: entry.name,
                hostname: host.id.clone(),
                file_url,
                clone_url: entry.clone_url,
                branch,
                publisher: Arc::clone(publisher),
                host: Arc::clone(host),
                headers: headers.to_vec(),
            };

            if sink.send(candidate).await.is_err() {
                tracing::error!("Candidate channel closed while listing {}", host.id);
                break;
            }
            sent += 1;
        }

        sent
    }
}

/// Explicit map from platform kind to adapter
///
/// Built once at startup and handed to the crawler; tests register their own
/// adapters.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<HostKind, Arc<dyn HostAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the GitHub, GitLab and Bitbucket adapters
    pub fn with_defaults(context: Arc<AdapterContext>) -> Self {
        let mut registry = Self::new();
        registry.register(
            HostKind::GitHub,
            Arc::new(GitHubAdapter::new(Arc::clone(&context))),
        );
        registry.register(
            HostKind::GitLab,
            Arc::new(GitLabAdapter::new(Arc::clone(&context))),
        );
        registry.register(HostKind::Bitbucket, Arc::new(BitbucketAdapter::new(context)));
        registry
    }

    /// Registers or replaces the adapter of a platform
    pub fn register(&mut self, kind: HostKind, adapter: Arc<dyn HostAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    pub fn get(&self, kind: HostKind) -> Option<Arc<dyn HostAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Adapter crawling exactly one repository of the given platform
    pub fn single_repository(&self, kind: HostKind) -> Option<Arc<dyn HostAdapter>> {
        self.get(kind)
            .map(|inner| Arc::new(SingleRepositoryAdapter::new(inner)) as Arc<dyn HostAdapter>)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::RateLimit;
    use tokio::sync::Mutex;

    /// Sink collecting every candidate it receives
    #[derive(Default)]
    pub struct CollectingSink {
        pub candidates: Mutex<Vec<RepositoryCandidate>>,
    }

    #[async_trait]
    impl CandidateSink for CollectingSink {
        async fn send(&self, candidate: RepositoryCandidate) -> Result<(), SinkClosed> {
            self.candidates.lock().await.push(candidate);
            Ok(())
        }
    }

    impl CollectingSink {
        pub async fn names(&self) -> Vec<String> {
            self.candidates
                .lock()
                .await
                .iter()
                .map(|c| c.name.clone())
                .collect()
        }
    }

    pub fn test_host(kind: HostKind, base: &str) -> Arc<Host> {
        let (listing, repository, raw) = match kind {
            HostKind::GitHub => (
                format!("{}/orgs/{{org}}/repos?page={{page}}", base),
                format!("{}/repos/{{name}}", base),
                format!("{}/raw/{{name}}/{{branch}}/{{file}}", base),
            ),
            HostKind::GitLab => (
                format!("{}/api/v4/groups/{{org}}/projects?page={{page}}", base),
                format!("{}/api/v4/projects/{{name}}", base),
                format!("{}/{{name}}/-/raw/{{branch}}/{{file}}", base),
            ),
            HostKind::Bitbucket => (
                format!("{}/2.0/repositories/{{org}}", base),
                format!("{}/2.0/repositories/{{name}}", base),
                format!("{}/{{name}}/raw/{{branch}}/{{file}}", base),
            ),
        };

        Arc::new(Host {
            id: kind.to_string(),
            kind,
            listing_url: listing,
            repository_url: repository,
            raw_url: raw,
            provenance_template: "{code}".to_string(),
            rate_limit: RateLimit::default(),
            credentials: vec!["token one".to_string(), "token two".to_string()],
        })
    }

    pub fn test_publisher() -> Arc<Publisher> {
        Arc::new(Publisher {
            name: "Comune di Test".to_string(),
            code: "c_test".to_string(),
            organizations: vec![],
            repositories: vec![],
            unknown_code: false,
        })
    }

    pub fn test_context() -> Arc<AdapterContext> {
        let http = crate::crawler::ReqwestClient::new(reqwest::Client::new());
        Arc::new(AdapterContext::new(
            Arc::new(http),
            Arc::new(FixedPicker(1)),
            "publiccode.yml",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn entry(name: &str, branch: Option<&str>) -> RepositoryEntry {
        RepositoryEntry {
            name: name.to_string(),
            clone_url: format!("https://example.org/{}.git", name),
            branch: branch.map(str::to_string),
        }
    }

    #[test]
    fn test_candidate_name_parts() {
        let candidate = RepositoryCandidate {
            name: "group/sub/app".to_string(),
            hostname: "gitlab.com".to_string(),
            file_url: String::new(),
            clone_url: String::new(),
            branch: "main".to_string(),
            publisher: test_publisher(),
            host: test_host(HostKind::GitLab, "https://gitlab.com"),
            headers: vec![],
        };
        assert_eq!(candidate.organization(), "group/sub");
        assert_eq!(candidate.repository(), "app");
    }

    #[test]
    fn test_request_headers_use_picked_credential() {
        let context = test_context();
        let host = test_host(HostKind::GitHub, "https://api.github.com");
        assert_eq!(
            context.request_headers(&host),
            vec![("Authorization".to_string(), "token two".to_string())]
        );
    }

    #[test]
    fn test_request_headers_without_credentials() {
        let context = test_context();
        let mut host = (*test_host(HostKind::GitHub, "https://api.github.com")).clone();
        host.credentials.clear();
        assert!(context.request_headers(&host).is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_skips_empty_branch() {
        let context = test_context();
        let host = test_host(HostKind::GitHub, "https://example.org");
        let sink = CollectingSink::default();

        let sent = context
            .enqueue(
                &host,
                &test_publisher(),
                vec![
                    entry("org/full", Some("main")),
                    entry("org/empty", Some("")),
                    entry("org/none", None),
                ],
                &[],
                &sink,
            )
            .await;

        assert_eq!(sent, 1);
        let candidates = sink.candidates.lock().await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].file_url,
            "https://example.org/raw/org/full/main/publiccode.yml"
        );
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AdapterRegistry::with_defaults(test_context());
        assert!(registry.get(HostKind::GitHub).is_some());
        assert!(registry.single_repository(HostKind::Bitbucket).is_some());
        assert!(AdapterRegistry::new().get(HostKind::GitLab).is_none());
    }
}
