use std::env;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{SearchErrorBody, SearchResponse};
use crate::secret::ApiKey;

const API_BASE: &str = "https://serpapi.com";
const SEARCH_ENGINE: &str = "google";
/// The search call blocks the whole stream session, so it gets a hard bound.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("SERPAPI_API_KEY not set. Get one at https://serpapi.com/manage-api-key")]
    ApiKeyNotSet,

    #[error("search API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction for the external search provider.
/// Implemented by `SearchClient` for production; mock implementations used in tests.
pub trait SearchProvider {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}

#[derive(Clone)]
pub struct SearchClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
}

impl SearchClient {
    pub fn from_env(http: Client) -> Result<Self, SearchError> {
        let api_key = env::var("SERPAPI_API_KEY").map_err(|_| SearchError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(SearchError::ApiKeyNotSet);
        }
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            base_url: API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            base_url: base_url.to_string(),
        }
    }
}

impl SearchProvider for SearchClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let url = format!("{}/search.json", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("engine", SEARCH_ENGINE),
                ("q", query),
                ("api_key", self.api_key.0.as_str()),
            ])
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SearchErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| {
                    let snippet = if text.len() > 200 { &text[..200] } else { &text };
                    format!("HTTP {status}: {snippet}")
                });
            warn!(status = %status, "search API error");
            return Err(SearchError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response.json().await?;
        debug!(results = body.organic_results.len(), "search complete");
        Ok(body)
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_success_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "rust language"))
            .and(query_param("engine", "google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "organic_results": [
                    {
                        "position": 1,
                        "title": "Rust",
                        "link": "https://rust-lang.org",
                        "snippet": "Systems programming language."
                    },
                    {"title": "No snippet entry"}
                ],
                "inline_videos": [
                    {"title": "Rust in 100 seconds", "link": "https://video.example"}
                ]
            })))
            .mount(&server)
            .await;

        let client = SearchClient::with_base_url(Client::new(), &server.uri());
        let result = client.search("rust language").await.unwrap();

        assert_eq!(result.organic_results.len(), 2);
        assert_eq!(
            result.organic_results[0].snippet.as_deref(),
            Some("Systems programming language.")
        );
        assert!(result.organic_results[1].snippet.is_none());
        assert_eq!(result.inline_videos.len(), 1);
    }

    #[tokio::test]
    async fn search_missing_sections_default_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"search_metadata": {"status": "Success"}})),
            )
            .mount(&server)
            .await;

        let client = SearchClient::with_base_url(Client::new(), &server.uri());
        let result = client.search("anything").await.unwrap();

        assert!(result.organic_results.is_empty());
        assert!(result.inline_videos.is_empty());
    }

    #[tokio::test]
    async fn search_error_body_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Invalid API key. Your API key should be here: https://serpapi.com/manage-api-key"
            })))
            .mount(&server)
            .await;

        let client = SearchClient::with_base_url(Client::new(), &server.uri());
        let err = client.search("test").await.unwrap_err();
        match err {
            SearchError::Api { code, message } => {
                assert_eq!(code, 401);
                assert!(message.contains("Invalid API key"), "got: {message}");
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_non_json_error_returns_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&server)
            .await;

        let client = SearchClient::with_base_url(Client::new(), &server.uri());
        let err = client.search("test").await.unwrap_err();
        match err {
            SearchError::Api { code: 503, message } => {
                assert!(message.contains("upstream overloaded"), "got: {message}");
            }
            other => panic!("expected Api(503), got: {other:?}"),
        }
    }
}
