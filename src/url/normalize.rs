use crate::{UrlError, UrlResult};
use sha2::{Digest, Sha256};
use url::Url;

/// Normalizes a repository URL so every spelling of it yields the same key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or without a host
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Collapse empty and dot segments of the path
/// 4. Remove a trailing `.git` and trailing slashes
/// 5. Remove query and fragment
///
/// # Examples
///
/// ```
/// use publiccode_crawler::url::canonical_repository_url;
///
/// let url = canonical_repository_url("https://WWW.GitHub.com/italia/app.git/").unwrap();
/// assert_eq!(url.as_str(), "https://github.com/italia/app");
/// ```
pub fn canonical_repository_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    let host = url
        .host_str()
        .ok_or_else(|| UrlError::MissingHost(url_str.to_string()))?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Stable identifier of a repository: SHA-256 of its canonical URL
pub fn repository_id(url_str: &str) -> UrlResult<String> {
    let canonical = canonical_repository_url(url_str)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_str().as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if let Some(last) = segments.last_mut() {
        let segment = *last;
        if let Some(stripped) = segment.strip_suffix(".git") {
            *last = stripped;
        }
    }
    segments.retain(|s| !s.is_empty());

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}
