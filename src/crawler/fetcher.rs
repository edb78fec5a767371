//! HTTP fetching
//!
//! This module handles the HTTP side of the crawler:
//! - Building the HTTP client with the crawler's user agent string
//! - The [`HttpClient`] seam adapters and workers fetch through
//! - Error classification for failed requests

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching a URL
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, timeout, TLS failure...
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body could not be decoded into the expected shape
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The body is larger than the client accepts
    #[error("{url} exceeds the {limit}-byte response limit")]
    TooLarge { url: String, limit: usize },
}

/// A received HTTP response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,

    /// Header values keyed by lowercase header name
    pub headers: HashMap<String, String>,

    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Issues GET requests with custom headers
///
/// Timeouts and connection pooling are the implementation's business.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use publiccode_crawler::config::UserAgentConfig;
/// use publiccode_crawler::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "PubliccodeCrawler".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Largest response body read into memory unless configured otherwise
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// [`HttpClient`] backed by `reqwest`
///
/// Bodies are read chunk by chunk and rejected with
/// [`FetchError::TooLarge`] once they pass the size limit.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
    max_body_bytes: usize,
}

impl ReqwestClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Builds the client from the user agent configuration
    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn too_large(&self, url: &str) -> FetchError {
        FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request.send().await.map_err(|e| transport_error(url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(self.too_large(url));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(url, e))? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };

    FetchError::Transport {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com".to_string(),
            contact_email: "test@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&test_config()).is_ok());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut response = HttpResponse {
            status: 200,
            ..HttpResponse::default()
        };
        response
            .headers
            .insert("link".to_string(), "<x>; rel=\"next\"".to_string());

        assert!(response.is_success());
        assert_eq!(response.header("Link"), Some("<x>; rel=\"next\""));
    }

    #[tokio::test]
    async fn test_get_sends_headers_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .and(header("authorization", "token abc"))
            .and(header(
                "user-agent",
                "TestCrawler/1.0 (+https://example.com; test@example.com)",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Next-Page", "2")
                    .set_body_string("hello"),
            )
            .mount(&server)
            .await;

        let client = ReqwestClient::from_config(&test_config()).unwrap();
        let response = client
            .get(
                &format!("{}/file", server.uri()),
                &[("Authorization".to_string(), "token abc".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hello");
        assert_eq!(response.header("x-next-page"), Some("2"));
    }

    #[tokio::test]
    async fn test_get_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ReqwestClient::from_config(&test_config()).unwrap();
        let response = client.get(&server.uri(), &[]).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_get_connection_refused() {
        let client = ReqwestClient::from_config(&test_config()).unwrap();
        let result = client.get("http://127.0.0.1:1/", &[]).await;
        assert!(matches!(result, Err(FetchError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 4096]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/small"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 512]))
            .mount(&server)
            .await;

        let client = ReqwestClient::from_config(&test_config())
            .unwrap()
            .with_max_body_bytes(1024);

        let result = client.get(&format!("{}/big", server.uri()), &[]).await;
        assert!(matches!(
            result,
            Err(FetchError::TooLarge { limit: 1024, .. })
        ));

        let response = client
            .get(&format!("{}/small", server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(response.body.len(), 512);
    }
}
