use crate::config::types::{Config, Publisher};
use crate::config::validation::{validate, validate_publishers};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use publiccode_crawler::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Hosts: {}", config.hosts.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stored with every run so runs made with different
/// configurations can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Parses the YAML content of one whitelist
pub fn parse_whitelist(content: &str, origin: &str) -> Result<Vec<Publisher>, ConfigError> {
    // An empty document is a valid, empty whitelist
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_yaml::from_str(content).map_err(|source| ConfigError::Whitelist {
        path: origin.to_string(),
        source,
    })
}

/// Reads every whitelist in order and concatenates their publishers
///
/// Any unreadable or malformed file aborts the whole load.
pub fn load_whitelists<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Publisher>, ConfigError> {
    let mut publishers = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let parsed = parse_whitelist(&content, &path.display().to_string())?;
        tracing::info!("Loaded {} publishers from {}", parsed.len(), path.display());
        publishers.extend(parsed);
    }

    validate_publishers(&publishers)?;

    Ok(publishers)
}
