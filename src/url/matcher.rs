/// Checks if a hostname matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "github.com" matches only "github.com"
/// 2. Wildcard match: "*.github.com" matches:
///    - "github.com" (the bare domain)
///    - "api.github.com" (single subdomain)
///    - "a.b.github.com" (nested subdomains)
///
/// Both arguments are expected to be lowercase.
///
/// # Examples
///
/// ```
/// use publiccode_crawler::url::matches_wildcard;
///
/// assert!(matches_wildcard("github.com", "github.com"));
/// assert!(matches_wildcard("*.bitbucket.org", "bitbucket.org"));
/// assert!(matches_wildcard("*.bitbucket.org", "www.bitbucket.org"));
/// assert!(!matches_wildcard("*.github.com", "notgithub.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Checks if any dot-separated label of a hostname starts with `label`
///
/// Used to recognize self-managed instances such as `gitlab.example.gov`.
pub fn has_label_prefix(hostname: &str, label: &str) -> bool {
    hostname.split('.').any(|part| part.starts_with(label))
}
