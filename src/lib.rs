//! publiccode-crawler: discovers and indexes `publiccode.yml` files
//!
//! This crate crawls the organizations listed in one or more whitelists across
//! GitHub, GitLab and Bitbucket, checks every repository for a `publiccode.yml`
//! file, validates that the file belongs to the publisher claiming it, scores
//! the repository's activity and publishes the results as a new index
//! generation behind a live alias.

pub mod activity;
pub mod config;
pub mod crawler;
pub mod hosts;
pub mod index;
pub mod metrics;
pub mod publiccode;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Validation error: {0}")]
    Validation(#[from] publiccode::ValidationError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Alias listing failed for '{alias}': {source}")]
    AliasListing {
        alias: String,
        source: index::IndexError,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse whitelist {path}: {source}")]
    Whitelist {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL template: {0}")]
    InvalidTemplate(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),

    #[error("Missing organization or repository path in URL: {0}")]
    MissingPath(String),

    #[error("Unknown template placeholder '{placeholder}' in {template}")]
    UnknownPlaceholder {
        template: String,
        placeholder: String,
    },
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, Host, Publisher};
pub use crawler::{crawl, Crawler, RunReport};
pub use hosts::{AdapterRegistry, RepositoryCandidate};
