//! Maps organization and repository URLs to the host that serves them

use crate::config::{Host, HostKind, RateLimit};
use crate::url::{has_label_prefix, matches_wildcard, parse_location, Location};
use std::sync::Arc;

/// A whitelist URL matched to its host
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub host: Arc<Host>,

    /// Organization or `organization/repository` path on that host
    pub path: String,
}

/// Resolves `url` against the configured hosts, then by hostname inference
///
/// A configured host matches when its id equals the URL's hostname (or
/// `hostname:port`). Otherwise the hostname is matched, in this order, against
/// `*.github.com`, `*.bitbucket.org` and any label starting with `gitlab`, and
/// the well-known definition of that platform is used. Returns `None` (with a
/// warning) when nothing matches.
pub fn resolve(url: &str, hosts: &[Arc<Host>]) -> Option<ResolvedTarget> {
    let location = match parse_location(url) {
        Ok(location) => location,
        Err(e) => {
            tracing::warn!("Skipping {}: {}", url, e);
            return None;
        }
    };

    let authority = location
        .origin
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&location.hostname);

    if let Some(host) = hosts.iter().find(|h| {
        let id = h.id.to_lowercase();
        id == location.hostname || id == authority
    }) {
        return Some(ResolvedTarget {
            host: Arc::clone(host),
            path: location.path,
        });
    }

    match infer_kind(&location.hostname) {
        Some(kind) => {
            tracing::debug!("Inferred {} for {}", kind, url);
            Some(ResolvedTarget {
                host: Arc::new(well_known_host(kind, &location)),
                path: location.path,
            })
        }
        None => {
            tracing::warn!("No host matches {}, skipping", url);
            None
        }
    }
}

fn infer_kind(hostname: &str) -> Option<HostKind> {
    if matches_wildcard("*.github.com", hostname) {
        Some(HostKind::GitHub)
    } else if matches_wildcard("*.bitbucket.org", hostname) {
        Some(HostKind::Bitbucket)
    } else if has_label_prefix(hostname, "gitlab") {
        Some(HostKind::GitLab)
    } else {
        None
    }
}

/// Public API definition of a platform
///
/// GitHub and Bitbucket always use their cloud APIs; GitLab is served from the
/// URL's own origin so self-managed instances work.
pub fn well_known_host(kind: HostKind, location: &Location) -> Host {
    let (id, listing_url, repository_url, raw_url) = match kind {
        HostKind::GitHub => (
            "github.com".to_string(),
            "https://api.github.com/orgs/{org}/repos?per_page=100&page={page}".to_string(),
            "https://api.github.com/repos/{name}".to_string(),
            "https://raw.githubusercontent.com/{name}/{branch}/{file}".to_string(),
        ),
        HostKind::Bitbucket => (
            "bitbucket.org".to_string(),
            "https://api.bitbucket.org/2.0/repositories/{org}?pagelen=100".to_string(),
            "https://api.bitbucket.org/2.0/repositories/{name}".to_string(),
            "https://bitbucket.org/{name}/raw/{branch}/{file}".to_string(),
        ),
        HostKind::GitLab => (
            location.hostname.clone(),
            format!(
                "{}/api/v4/groups/{{org}}/projects?include_subgroups=true&per_page=100&page={{page}}",
                location.origin
            ),
            format!("{}/api/v4/projects/{{name}}", location.origin),
            format!("{}/{{name}}/-/raw/{{branch}}/{{file}}", location.origin),
        ),
    };

    Host {
        id,
        kind,
        listing_url,
        repository_url,
        raw_url,
        provenance_template: "{code}".to_string(),
        rate_limit: RateLimit::default(),
        credentials: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(id: &str, kind: HostKind) -> Arc<Host> {
        let location = parse_location(&format!("https://{}/x", id)).unwrap();
        let mut host = well_known_host(kind, &location);
        host.id = id.to_string();
        host.credentials = vec!["token configured".to_string()];
        Arc::new(host)
    }

    #[test]
    fn test_configured_host_wins() {
        let hosts = vec![configured("github.com", HostKind::GitHub)];
        let target = resolve("https://github.com/italia", &hosts).unwrap();
        assert_eq!(target.path, "italia");
        assert_eq!(target.host.credentials.len(), 1);
    }

    #[test]
    fn test_configured_host_with_port() {
        let hosts = vec![
            configured("127.0.0.1:4000", HostKind::GitHub),
            configured("127.0.0.1:5000", HostKind::GitLab),
        ];
        let target = resolve("http://127.0.0.1:5000/group", &hosts).unwrap();
        assert_eq!(target.host.kind, HostKind::GitLab);
    }

    #[test]
    fn test_inference_order() {
        let github = resolve("https://www.github.com/italia", &[]).unwrap();
        assert_eq!(github.host.kind, HostKind::GitHub);
        assert_eq!(github.host.id, "github.com");

        let bitbucket = resolve("https://bitbucket.org/ente", &[]).unwrap();
        assert_eq!(bitbucket.host.kind, HostKind::Bitbucket);

        let gitlab = resolve("https://gitlab.comune.example.it/ente/sub", &[]).unwrap();
        assert_eq!(gitlab.host.kind, HostKind::GitLab);
        assert_eq!(gitlab.path, "ente/sub");
        assert!(gitlab
            .host
            .listing_url
            .starts_with("https://gitlab.comune.example.it/api/v4/groups/"));
    }

    #[test]
    fn test_unknown_host_is_skipped() {
        assert!(resolve("https://git.example.org/ente", &[]).is_none());
        assert!(resolve("not a url", &[]).is_none());
        assert!(resolve("https://github.com/", &[]).is_none());
    }
}
