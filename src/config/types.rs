use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub hosts: Vec<Host>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of availability workers running at once
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: u32,

    /// Capacity of the candidate channel between adapters and workers
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Name of the metadata file looked up in every repository
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// First delay after a failed page fetch (milliseconds)
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the delay between page fetch retries (milliseconds)
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Consecutive page failures after which an organization is given up
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Trailing window of commit history used for activity scoring (days)
    #[serde(default = "default_activity_window")]
    pub activity_window_days: u32,

    /// Width of one vitality bucket (days)
    #[serde(default = "default_activity_bucket")]
    pub activity_bucket_days: u32,

    /// Clone or update repositories to read their commit history
    #[serde(default)]
    pub clone_repositories: bool,

    /// Largest HTTP response body read into memory (bytes)
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

fn default_max_concurrent_workers() -> u32 {
    32
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_file_name() -> String {
    "publiccode.yml".to_string()
}

fn default_initial_backoff() -> u64 {
    1_000
}

fn default_max_backoff() -> u64 {
    60_000
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_activity_window() -> u32 {
    60
}

fn default_activity_bucket() -> u32 {
    1
}

fn default_max_response_bytes() -> usize {
    8 * 1024 * 1024
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: default_max_concurrent_workers(),
            channel_capacity: default_channel_capacity(),
            file_name: default_file_name(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_consecutive_failures: default_max_consecutive_failures(),
            activity_window_days: default_activity_window(),
            activity_bucket_days: default_activity_bucket(),
            clone_repositories: false,
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent string: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database holding runs and checkpoints
    pub database_path: String,

    /// Path to the SQLite database backing the search index
    pub index_path: String,

    /// Directory receiving the raw metadata files
    pub data_dir: String,

    /// Directory receiving repository clones used for activity scoring
    #[serde(default = "default_clone_dir")]
    pub clone_dir: String,
}

fn default_clone_dir() -> String {
    "./repos".to_string()
}

/// Search index configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Alias readers query; always points at the last completed generation
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Index receiving one record per administration code
    #[serde(default = "default_administrations")]
    pub administrations: String,
}

fn default_alias() -> String {
    "publiccode".to_string()
}

fn default_administrations() -> String {
    "administrations".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            administrations: default_administrations(),
        }
    }
}

/// Supported hosting platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    GitHub,
    GitLab,
    Bitbucket,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Bitbucket => "bitbucket",
        };
        write!(f, "{}", name)
    }
}

/// A hosting platform the crawler can list repositories from
///
/// URL templates accept the placeholders `{org}`, `{page}`, `{name}`,
/// `{branch}` and `{file}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Host {
    /// Identifier, also the hostname organization URLs are matched against
    pub id: String,

    /// Which adapter speaks this host's API
    pub kind: HostKind,

    /// Listing URL for one organization (`{org}`, `{page}`)
    pub listing_url: String,

    /// API URL for a single repository (`{name}`)
    pub repository_url: String,

    /// Raw content URL of a file in a repository (`{name}`, `{branch}`, `{file}`)
    pub raw_url: String,

    /// Template producing the provenance code expected in metadata files (`{code}`)
    #[serde(default = "default_provenance_template")]
    pub provenance_template: String,

    #[serde(default)]
    pub rate_limit: RateLimit,

    /// `Authorization` header values; one is picked per request
    #[serde(default)]
    pub credentials: Vec<String>,
}

fn default_provenance_template() -> String {
    "{code}".to_string()
}

/// Request budget of a host
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RateLimit {
    #[serde(rename = "req/h")]
    pub requests_per_hour: Option<u32>,

    #[serde(rename = "req/m")]
    pub requests_per_minute: Option<u32>,
}

impl RateLimit {
    /// Minimum spacing between two requests honoring both budgets
    pub fn interval(&self) -> Duration {
        let per_hour = self
            .requests_per_hour
            .filter(|n| *n > 0)
            .map(|n| Duration::from_secs(3600) / n)
            .unwrap_or(Duration::ZERO);
        let per_minute = self
            .requests_per_minute
            .filter(|n| *n > 0)
            .map(|n| Duration::from_secs(60) / n)
            .unwrap_or(Duration::ZERO);

        std::cmp::max(per_hour, per_minute)
    }
}

/// A public administration whose repositories are crawled
#[derive(Debug, Clone, Deserialize)]
pub struct Publisher {
    #[serde(default)]
    pub name: String,

    /// Provenance code expected inside every metadata file it publishes
    #[serde(rename = "codice-iPA", default)]
    pub code: String,

    /// Organization URLs whose repositories are listed
    #[serde(rename = "orgs", default)]
    pub organizations: Vec<String>,

    /// Individual repository URLs
    #[serde(rename = "repos", default)]
    pub repositories: Vec<String>,

    /// The code has not been verified against the official registry
    #[serde(rename = "unknown-iPA", default)]
    pub unknown_code: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_hourly_budget() {
        let limit = RateLimit {
            requests_per_hour: Some(3600),
            requests_per_minute: None,
        };
        assert_eq!(limit.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_interval_takes_stricter_budget() {
        let limit = RateLimit {
            requests_per_hour: Some(7200),
            requests_per_minute: Some(30),
        };
        assert_eq!(limit.interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_interval_without_budget() {
        assert_eq!(RateLimit::default().interval(), Duration::ZERO);
    }

    #[test]
    fn test_host_kind_display() {
        assert_eq!(HostKind::GitHub.to_string(), "github");
        assert_eq!(HostKind::Bitbucket.to_string(), "bitbucket");
    }
}
