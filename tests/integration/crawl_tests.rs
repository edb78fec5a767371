//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for a GitHub-style API and for the
//! raw file host, and run full crawls end-to-end.

use publiccode_crawler::config::{
    Config, CrawlerConfig, Host, HostKind, IndexConfig, OutputConfig, Publisher, RateLimit,
    UserAgentConfig,
};
use publiccode_crawler::crawler::Crawler;
use publiccode_crawler::index::SearchIndex;
use publiccode_crawler::storage::{RunLog, RunStatus};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with one GitHub-style host served by `base`
fn create_test_config(base: &str, dir: &TempDir) -> Config {
    let authority = base.trim_start_matches("http://").to_string();
    let in_dir = |name: &str| dir.path().join(name).display().to_string();

    Config {
        crawler: CrawlerConfig {
            max_concurrent_workers: 4,
            channel_capacity: 8,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            max_consecutive_failures: 3,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: in_dir("crawler.db"),
            index_path: in_dir("index.db"),
            data_dir: in_dir("data"),
            clone_dir: in_dir("repos"),
        },
        index: IndexConfig::default(),
        hosts: vec![Host {
            id: authority,
            kind: HostKind::GitHub,
            listing_url: format!("{}/orgs/{{org}}/repos?page={{page}}", base),
            repository_url: format!("{}/repos/{{name}}", base),
            raw_url: format!("{}/raw/{{name}}/{{branch}}/{{file}}", base),
            provenance_template: "{code}".to_string(),
            rate_limit: RateLimit::default(),
            credentials: vec!["token test".to_string()],
        }],
    }
}

fn publisher(base: &str) -> Publisher {
    Publisher {
        name: "Comune di Test".to_string(),
        code: "c_test".to_string(),
        organizations: vec![format!("{}/ente", base)],
        repositories: vec![format!("{}/ente/solo", base)],
        unknown_code: false,
    }
}

fn repository(name: &str, branch: Option<&str>) -> serde_json::Value {
    json!({
        "full_name": name,
        "default_branch": branch,
        "clone_url": format!("https://git.example/{}.git", name),
    })
}

fn publiccode(name: &str, code: &str) -> String {
    format!(
        "publiccodeYmlVersion: '0.2'\nname: {}\nurl: https://git.example/{}\nit:\n  riuso:\n    codiceIPA: {}\n",
        name, name, code
    )
}

async fn mount_file(server: &MockServer, name: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/raw/{}/main/publiccode.yml", name)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts two listing pages of `ente`, one single repository, and their files
///
/// - `ente/app` and `ente/solo` publish a file of the publisher
/// - `ente/empty` has no default branch
/// - `ente/foreign` publishes a file of another administration
/// - `ente/missing` has no file
async fn mount_platform(server: &MockServer) {
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/orgs/ente/repos"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "link",
                    format!("<{}/orgs/ente/repos?page=2>; rel=\"next\"", base).as_str(),
                )
                .set_body_json(json!([
                    repository("ente/app", Some("main")),
                    repository("ente/empty", None),
                ])),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orgs/ente/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            repository("ente/foreign", Some("main")),
            repository("ente/missing", Some("main")),
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/ente/solo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repository("ente/solo", Some("main"))))
        .mount(server)
        .await;

    mount_file(server, "ente/app", publiccode("app", "c_test")).await;
    mount_file(server, "ente/solo", publiccode("solo", "C_TEST")).await;
    mount_file(server, "ente/foreign", publiccode("foreign", "c_other")).await;

    Mock::given(method("GET"))
        .and(path("/raw/ente/missing/main/publiccode.yml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_publishes_generation() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    let dir = TempDir::new().unwrap();

    let config = create_test_config(&server.uri(), &dir);
    let crawler = Crawler::from_config(config, "hash").unwrap();
    let report = crawler.run(&[publisher(&server.uri())]).await.unwrap();

    assert!(report.published());
    assert_eq!(report.organizations, 2);
    assert_eq!(report.organizations_failed, 0);
    assert_eq!(report.metrics.repository_processed, 4);
    assert_eq!(report.metrics.repository_file_indexed, 2);
    assert_eq!(report.metrics.validation_failed, 1);

    let index = crawler.index();
    assert_eq!(
        index.indices_for_alias("publiccode").unwrap(),
        vec![report.generation.clone()]
    );
    assert_eq!(index.count("publiccode").unwrap(), 2);
    assert!(index.get("administrations", "c_test").unwrap().is_some());

    let run = crawler.run_log().get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.documents_indexed, 2);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_rerun_moves_alias_to_new_generation() {
    let server = MockServer::start().await;
    mount_platform(&server).await;
    let dir = TempDir::new().unwrap();

    let config = create_test_config(&server.uri(), &dir);
    let crawler = Crawler::from_config(config, "hash").unwrap();
    let publishers = [publisher(&server.uri())];

    let first = crawler.run(&publishers).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = crawler.run(&publishers).await.unwrap();

    assert_ne!(first.generation, second.generation);
    let index = crawler.index();
    assert_eq!(
        index.indices_for_alias("publiccode").unwrap(),
        vec![second.generation.clone()]
    );
    assert_eq!(index.count("publiccode").unwrap(), 2);
    assert_eq!(index.count(&first.generation).unwrap(), 2);
}

#[tokio::test]
async fn test_failing_organization_keeps_checkpoint() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/orgs/ente/repos"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "link",
                    format!("<{}/orgs/ente/repos?page=2>; rel=\"next\"", base).as_str(),
                )
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orgs/ente/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base, &dir);
    let crawler = Crawler::from_config(config, "hash").unwrap();

    let only_org = Publisher {
        repositories: vec![],
        ..publisher(&base)
    };
    let report = crawler.run(std::slice::from_ref(&only_org)).await.unwrap();

    assert_eq!(report.organizations_failed, 1);
    assert!(report.published());
    assert_eq!(crawler.index().count("publiccode").unwrap(), 0);

    // The next run resumes from the page that failed
    let jobs = crawler.plan(std::slice::from_ref(&only_org));
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].start_url, format!("{}/orgs/ente/repos?page=2", base));

    crawler.clear_checkpoints().unwrap();
    let jobs = crawler.plan(&[only_org]);
    assert_eq!(jobs[0].start_url, format!("{}/orgs/ente/repos?page=1", base));
}

#[tokio::test]
async fn test_unmatched_urls_are_skipped() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:1", &dir);
    let crawler = Crawler::from_config(config, "hash").unwrap();

    let stranger = Publisher {
        name: "Elsewhere".to_string(),
        code: "c_else".to_string(),
        organizations: vec!["https://code.example.org/group".to_string()],
        repositories: vec![],
        unknown_code: false,
    };
    assert!(crawler.plan(&[stranger]).is_empty());
}
