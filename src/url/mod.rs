//! URL handling module
//!
//! This module provides URL templating for host definitions, canonical
//! repository URLs and identifiers, hostname extraction and matching, and the
//! parsing of organization and repository URLs found in whitelists.

mod domain;
mod matcher;
mod normalize;
pub mod template;

use crate::{UrlError, UrlResult};
use url::Url;

pub use domain::extract_domain;
pub use matcher::{has_label_prefix, matches_wildcard};
pub use normalize::{canonical_repository_url, repository_id};

/// Where an organization or repository lives: its hostname and its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Lowercase hostname
    pub hostname: String,

    /// `scheme://host[:port]` of the URL
    pub origin: String,

    /// Path without leading or trailing slashes, e.g. `italia` or `group/subgroup/repo`
    pub path: String,
}

/// Parses an organization or repository URL from a whitelist
///
/// # Examples
///
/// ```
/// use publiccode_crawler::url::parse_location;
///
/// let location = parse_location("https://gitlab.com/group/subgroup/").unwrap();
/// assert_eq!(location.hostname, "gitlab.com");
/// assert_eq!(location.path, "group/subgroup");
/// ```
pub fn parse_location(url_str: &str) -> UrlResult<Location> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    let hostname =
        extract_domain(&url).ok_or_else(|| UrlError::MissingHost(url_str.to_string()))?;

    let path = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    let path = path.strip_suffix(".git").unwrap_or(&path).to_string();

    if path.is_empty() {
        return Err(UrlError::MissingPath(url_str.to_string()));
    }

    let origin = url.origin().ascii_serialization();

    Ok(Location {
        hostname,
        origin,
        path,
    })
}
