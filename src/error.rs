//! Error types for the research workflow
//!
//! Every failure of an external collaborator surfaces here and aborts the
//! run. Nothing in this crate retries or recovers locally; the Tavily client
//! is the only place with retry logic, and only for transient HTTP failures.

use thiserror::Error;

/// Failure of one structured completion call site
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The model provider failed (network, auth, rate limit, ...)
    #[error("{agent}: completion backend failed: {message}")]
    Backend { agent: String, message: String },

    /// The response could not be read as the declared output shape
    #[error("{agent}: response does not match the expected schema: {message}")]
    SchemaViolation { agent: String, message: String },

    #[error("{agent}: model returned an empty response")]
    EmptyResponse { agent: String },

    /// The call-site input could not be rendered into a prompt
    #[error("{agent}: could not render prompt input: {message}")]
    InvalidInput { agent: String, message: String },
}

impl CompletionError {
    pub fn backend(agent: impl Into<String>, message: impl ToString) -> Self {
        Self::Backend {
            agent: agent.into(),
            message: message.to_string(),
        }
    }

    pub fn schema(agent: impl Into<String>, message: impl ToString) -> Self {
        Self::SchemaViolation {
            agent: agent.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error came from a malformed response rather than the provider
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation { .. } | Self::EmptyResponse { .. }
        )
    }
}

/// Typed errors for the web search backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Query too long ({0} characters, max 400)")]
    QueryTooLong(usize),

    #[error("TAVILY_API_KEY environment variable not set")]
    MissingApiKey,
}

impl SearchError {
    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout
                | SearchError::Connection(_)
                | SearchError::RateLimited
                | SearchError::ServerError(_, _)
        )
    }
}

/// Top-level error returned by a research run
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    /// Query generation produced nothing to search for
    #[error("Query generation returned no search queries")]
    NoQueries,
}

impl ResearchError {
    /// True for failures raised by the completion or search services
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Completion(_) | Self::Search(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_error_display() {
        let err = CompletionError::schema("extractor", "missing field `role`");
        assert!(err.to_string().contains("extractor"));
        assert!(err.to_string().contains("missing field `role`"));
        assert!(err.is_schema_violation());
        assert!(!CompletionError::backend("reflection", "503").is_schema_violation());
    }

    #[test]
    fn test_search_error_retryable() {
        assert!(SearchError::Timeout.is_retryable());
        assert!(SearchError::RateLimited.is_retryable());
        assert!(SearchError::ServerError(500, "".to_string()).is_retryable());
        assert!(SearchError::Connection("failed".to_string()).is_retryable());

        assert!(!SearchError::Unauthorized.is_retryable());
        assert!(!SearchError::BadRequest("invalid".to_string()).is_retryable());
        assert!(!SearchError::QueryTooLong(401).is_retryable());
    }

    #[test]
    fn test_research_error_from_search() {
        let err: ResearchError = SearchError::RateLimited.into();
        assert!(matches!(err, ResearchError::Search(_)));
        assert!(err.is_external());
        assert!(err.to_string().contains("Rate limited"));
        assert!(!ResearchError::NoQueries.is_external());
    }
}
