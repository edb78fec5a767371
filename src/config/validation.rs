use crate::config::types::{Config, CrawlerConfig, Host, IndexConfig, Publisher, UserAgentConfig};
use crate::url::template::placeholders;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_index_config(&config.index)?;
    validate_hosts(&config.hosts)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_workers < 1 || config.max_concurrent_workers > 1024 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_workers must be between 1 and 1024, got {}",
            config.max_concurrent_workers
        )));
    }

    if config.channel_capacity < 1 {
        return Err(ConfigError::Validation(
            "channel_capacity must be >= 1".to_string(),
        ));
    }

    if config.file_name.is_empty() || config.file_name.contains('/') {
        return Err(ConfigError::Validation(format!(
            "file_name must be a bare file name, got '{}'",
            config.file_name
        )));
    }

    if config.max_backoff_ms < config.initial_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "max_backoff_ms ({}) must be >= initial_backoff_ms ({})",
            config.max_backoff_ms, config.initial_backoff_ms
        )));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "max_consecutive_failures must be >= 1".to_string(),
        ));
    }

    if config.activity_window_days < 1 || config.activity_bucket_days < 1 {
        return Err(ConfigError::Validation(
            "activity window and bucket must be at least one day".to_string(),
        ));
    }

    if config.max_response_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_response_bytes must be at least 1024, got {}",
            config.max_response_bytes
        )));
    }

    if config.activity_bucket_days > config.activity_window_days {
        return Err(ConfigError::Validation(format!(
            "activity_bucket_days ({}) cannot exceed activity_window_days ({})",
            config.activity_bucket_days, config.activity_window_days
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database_path", &config.database_path),
        ("index_path", &config.index_path),
        ("data_dir", &config.data_dir),
        ("clone_dir", &config.clone_dir),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    if config.alias.is_empty() || config.administrations.is_empty() {
        return Err(ConfigError::Validation(
            "index alias and administrations index cannot be empty".to_string(),
        ));
    }

    if config.alias == config.administrations {
        return Err(ConfigError::Validation(format!(
            "index alias '{}' collides with the administrations index",
            config.alias
        )));
    }

    Ok(())
}

/// Validates host definitions and their URL templates
fn validate_hosts(hosts: &[Host]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for host in hosts {
        if host.id.is_empty() {
            return Err(ConfigError::Validation("host id cannot be empty".to_string()));
        }

        if !seen.insert(host.id.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate host id '{}'",
                host.id
            )));
        }

        validate_template(&host.listing_url, &["org", "page"], &["org"])?;
        validate_template(&host.repository_url, &["name"], &["name"])?;
        validate_template(&host.raw_url, &["name", "branch", "file"], &["name", "branch"])?;
        validate_template(&host.provenance_template, &["code"], &[])?;

        if host.credentials.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "host '{}' has an empty credential",
                host.id
            )));
        }
    }

    Ok(())
}

/// Checks a template only uses `allowed` placeholders and contains every `required` one
fn validate_template(template: &str, allowed: &[&str], required: &[&str]) -> Result<(), ConfigError> {
    let used = placeholders(template);

    if let Some(unknown) = used.iter().find(|p| !allowed.contains(&p.as_str())) {
        return Err(ConfigError::InvalidTemplate(format!(
            "'{}' uses unknown placeholder {{{}}}",
            template, unknown
        )));
    }

    if let Some(missing) = required.iter().find(|r| !used.iter().any(|p| p == *r)) {
        return Err(ConfigError::InvalidTemplate(format!(
            "'{}' is missing placeholder {{{}}}",
            template, missing
        )));
    }

    Ok(())
}

/// Validates that every organization and repository URL is an absolute http(s) URL
pub fn validate_publishers(publishers: &[Publisher]) -> Result<(), ConfigError> {
    for publisher in publishers {
        for raw in publisher
            .organizations
            .iter()
            .chain(publisher.repositories.iter())
        {
            let url = Url::parse(raw).map_err(|e| {
                ConfigError::InvalidUrl(format!(
                    "Invalid URL '{}' for publisher '{}': {}",
                    raw, publisher.name, e
                ))
            })?;

            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(ConfigError::InvalidUrl(format!(
                    "URL '{}' for publisher '{}' must be an http(s) URL with a host",
                    raw, publisher.name
                )));
            }
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
