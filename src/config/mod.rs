//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating the TOML crawler
//! configuration and the YAML publisher whitelists.
//!
//! # Example
//!
//! ```no_run
//! use publiccode_crawler::config::{load_config, load_whitelists};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! let publishers = load_whitelists(&[Path::new("whitelist.yml")]).unwrap();
//! println!("{} hosts, {} publishers", config.hosts.len(), publishers.len());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, Host, HostKind, IndexConfig, OutputConfig, Publisher, RateLimit,
    UserAgentConfig,
};

pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_whitelists, parse_whitelist,
};
