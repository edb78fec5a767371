use url::Url;

/// Extracts the lowercase hostname of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use publiccode_crawler::url::extract_domain;
///
/// let url = Url::parse("https://GitHub.com/italia").unwrap();
/// assert_eq!(extract_domain(&url), Some("github.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://github.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("github.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/org").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://GitLab.Example.GOV/group").unwrap();
        assert_eq!(extract_domain(&url), Some("gitlab.example.gov".to_string()));
    }
}
