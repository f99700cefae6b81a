//! Web search client
//!
//! [`SearchClient`] is the seam the workflow searches through; one call is
//! one query. [`TavilyClient`] implements it over the Tavily Search API.
//!
//! # Production Features
//!
//! - Type-safe enums for search depth and topic
//! - HTTP timeout and retry with exponential backoff for transient failures
//! - Typed errors for rate limits, auth failures and timeouts

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SearchError;

const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Default timeout for Tavily API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Ceiling on any single backoff sleep
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

const MAX_QUERY_CHARS: usize = 400;

/// A single web result. Its identity is the url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    pub title: String,
    /// The most relevant content snippet
    pub content: String,
    /// Full page text, when requested and available
    #[serde(default)]
    pub raw_content: Option<String>,
}

impl SourceDocument {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            raw_content: None,
        }
    }

    pub fn with_raw_content(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = Some(raw.into());
        self
    }
}

/// An unrecognised option value
#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseOptionError {
    kind: &'static str,
    value: String,
}

/// Search depth
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    /// Fast search with basic results
    #[default]
    Basic,
    /// More thorough search with detailed results
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

impl FromStr for SearchDepth {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(SearchDepth::Basic),
            "advanced" => Ok(SearchDepth::Advanced),
            _ => Err(ParseOptionError {
                kind: "search depth",
                value: s.to_string(),
            }),
        }
    }
}

/// Topic filter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// General web search
    #[default]
    General,
    /// Recent news articles
    News,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::General => "general",
            Topic::News => "news",
        }
    }
}

impl FromStr for Topic {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Topic::General),
            "news" => Ok(Topic::News),
            _ => Err(ParseOptionError {
                kind: "search topic",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-request search options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub search_depth: SearchDepth,
    /// Only return results from the last N days
    pub recency_days: Option<u32>,
    pub max_results: u32,
    pub include_raw_content: bool,
    pub topic: Topic,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_depth: SearchDepth::Basic,
            recency_days: Some(360),
            max_results: 3,
            include_raw_content: true,
            topic: Topic::General,
        }
    }
}

/// Executes one query against a web-search backend
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SourceDocument>, SearchError>;
}

// =============================================================================
// TAVILY
// =============================================================================

/// Tavily Search API client
///
/// # Example
/// ```ignore
/// let client = TavilyClient::new("your-api-key").with_max_retries(1);
/// let docs = client.search("ada lovelace", &SearchOptions::default()).await?;
/// ```
pub struct TavilyClient {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: TAVILY_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }

    /// Create from environment variable TAVILY_API_KEY
    pub fn from_env() -> Result<Self, SearchError> {
        let api_key = std::env::var("TAVILY_API_KEY").map_err(|_| SearchError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Point the client at another endpoint (e.g. a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Execute HTTP request with retry and backoff
    async fn execute_with_retry(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, SearchError> {
        let mut attempt = 0;
        loop {
            match self.execute_single_request(request).await {
                Ok(response) => return Ok(response),
                // Only retry on transient errors
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = retry_delay(self.retry_base_delay, attempt);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Tavily request failed, will retry");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_single_request(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, SearchError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else if e.is_connect() {
                    SearchError::Connection(e.to_string())
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| SearchError::ParseError(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(SearchError::Unauthorized),
            429 => Err(SearchError::RateLimited),
            400 => Err(SearchError::BadRequest(error_text)),
            500..=599 => Err(SearchError::ServerError(status.as_u16(), error_text)),
            _ => Err(SearchError::HttpError(status.as_u16(), error_text)),
        }
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SourceDocument>, SearchError> {
        let query_chars = query.chars().count();
        if query_chars > MAX_QUERY_CHARS {
            return Err(SearchError::QueryTooLong(query_chars));
        }

        let request = TavilyRequest {
            query,
            max_results: options.max_results.clamp(1, 20),
            search_depth: options.search_depth.as_str(),
            topic: options.topic.as_str(),
            days: options.recency_days,
            include_answer: false,
            include_raw_content: options.include_raw_content,
        };

        debug!(query = %query, max_results = request.max_results, "Querying Tavily");

        let response = self.execute_with_retry(&request).await?;

        debug!(query = %query, count = response.results.len(), "Tavily search completed");

        Ok(response
            .results
            .into_iter()
            .map(|r| SourceDocument {
                url: r.url,
                title: r.title,
                content: r.content,
                raw_content: r.raw_content,
            })
            .collect())
    }
}

/// Request body for Tavily API
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    topic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    days: Option<u32>,
    include_answer: bool,
    include_raw_content: bool,
}

/// Response from Tavily API
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
}

/// Exponential backoff: `base * 2^attempt`, saturating at [`MAX_RETRY_DELAY`]
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_then_saturates() {
        let base = Duration::from_millis(1000);
        assert_eq!(retry_delay(base, 0), Duration::from_secs(1));
        assert_eq!(retry_delay(base, 2), Duration::from_secs(4));
        assert_eq!(retry_delay(base, 5), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(base, 31), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(base, 32), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(base, u32::MAX), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_search_depth_serialization() {
        assert_eq!(SearchDepth::Basic.as_str(), "basic");
        assert_eq!(SearchDepth::Advanced.as_str(), "advanced");

        let json = serde_json::to_string(&SearchDepth::Advanced).unwrap();
        assert_eq!(json, r#""advanced""#);

        assert_eq!("Basic".parse::<SearchDepth>().unwrap(), SearchDepth::Basic);
        assert!("deep".parse::<SearchDepth>().is_err());
    }

    #[test]
    fn test_topic_parse() {
        assert_eq!("news".parse::<Topic>().unwrap(), Topic::News);
        assert_eq!(" GENERAL ".parse::<Topic>().unwrap(), Topic::General);
        assert!("sports".parse::<Topic>().is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = TavilyRequest {
            query: "ada lovelace",
            max_results: 3,
            search_depth: "basic",
            topic: "general",
            days: Some(360),
            include_answer: false,
            include_raw_content: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["days"], 360);
        assert_eq!(json["include_raw_content"], true);

        let request = TavilyRequest { days: None, ..request };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("days").is_none());
    }

    #[test]
    fn test_from_env_missing_key() {
        std::env::remove_var("TAVILY_API_KEY");
        assert!(matches!(
            TavilyClient::from_env(),
            Err(SearchError::MissingApiKey)
        ));
    }

    #[test]
    fn test_builder_pattern() {
        let client = TavilyClient::new("test-key")
            .with_base_url("http://localhost:1234/")
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(5);

        assert_eq!(client.base_url, "http://localhost:1234");
        assert_eq!(client.timeout, Duration::from_secs(60));
        assert_eq!(client.max_retries, 5);
    }

    #[tokio::test]
    async fn test_query_too_long_is_rejected_before_request() {
        let client = TavilyClient::new("test-key").with_base_url("http://127.0.0.1:9");
        let query = "x".repeat(401);

        let result = client.search(&query, &SearchOptions::default()).await;
        assert!(matches!(result, Err(SearchError::QueryTooLong(401))));
    }
}

/// HTTP tests against a mock Tavily server
#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TavilyClient {
        TavilyClient::new("test-api-key")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0)
            .with_retry_base_delay(Duration::from_millis(10))
    }

    fn sample_success_response() -> serde_json::Value {
        serde_json::json!({
            "answer": null,
            "results": [
                {
                    "title": "Ada Lovelace - Analytical Engines",
                    "url": "https://example.com/ada",
                    "content": "Ada Lovelace is CTO at Analytical Engines.",
                    "score": 0.95,
                    "raw_content": "Full page text"
                },
                {
                    "title": "Ada on LinkedIn",
                    "url": "https://linkedin.com/in/ada",
                    "content": "Experience: Analytical Engines, Difference Co.",
                    "score": 0.88,
                    "raw_content": null
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_http_successful_search() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_partial_json(serde_json::json!({
                "query": "ada lovelace",
                "search_depth": "basic",
                "days": 360,
                "max_results": 3,
                "include_raw_content": true,
                "topic": "general"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_success_response()))
            .mount(&mock_server)
            .await;

        let docs = client_for(&mock_server)
            .search("ada lovelace", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].url, "https://example.com/ada");
        assert_eq!(docs[0].raw_content.as_deref(), Some("Full page text"));
        assert_eq!(docs[1].raw_content, None);
    }

    #[tokio::test]
    async fn test_http_unauthorized_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .search("test", &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(SearchError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_http_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit exceeded"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .search("test", &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(SearchError::RateLimited)));
    }

    #[tokio::test]
    async fn test_http_retry_on_server_error() {
        let mock_server = MockServer::start().await;

        // First two calls fail with 500, third succeeds
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_success_response()))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .with_max_retries(3)
            .search("test", &SearchOptions::default())
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_http_gives_up_after_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .with_max_retries(2)
            .search("test", &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(SearchError::ServerError(503, _))));
    }

    #[tokio::test]
    async fn test_http_no_retry_on_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .with_max_retries(3)
            .search("test", &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(SearchError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_http_malformed_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .search("test", &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(SearchError::ParseError(_))));
    }
}
