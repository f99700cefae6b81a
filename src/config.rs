//! # Configuration Module
//!
//! Loads settings from environment variables (and a `.env` file, if present)
//! on top of defaults that mirror the reference research behaviour:
//! basic-depth searches over the last 360 days, 3 results per query, raw
//! page content capped at 1000 tokens, and at most 2 reflection cycles.
//!
//! | Variable | Purpose | Default |
//! |----------|---------|---------|
//! | `LLM_PROVIDER` | `openai` or `ollama` | `openai` |
//! | `LLM_MODEL` | Model name | `gpt-4o` / `llama3.2` |
//! | `OLLAMA_API_BASE_URL` | Ollama server | `http://localhost:11434` |
//! | `LLM_TEMPERATURE` | Sampling temperature | `0.0` |
//! | `TAVILY_API_KEY` | Search API key | required |
//! | `MAX_SEARCH_QUERIES` | Queries per generation pass | `3` |
//! | `MAX_REFLECTIONS` | Reflection-triggered cycles | `2` |
//! | `MAX_RESULTS_PER_QUERY` | Results per search | `3` |
//! | `SEARCH_RECENCY_DAYS` | Recency window | `360` |
//! | `SEARCH_DEPTH` | `basic` or `advanced` | `basic` |
//! | `SEARCH_TOPIC` | `general` or `news` | `general` |
//! | `MAX_TOKENS_PER_SOURCE` | Raw content budget | `1000` |
//! | `INCLUDE_RAW_CONTENT` | Fetch full page text | `true` |
//! | `SEARCH_TIMEOUT_SECS` | Per-request timeout | `30` |
//! | `SEARCH_MAX_RETRIES` | Transient-failure retries (at most 10) | `3` |

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::search::{SearchDepth, SearchOptions, Topic};
use crate::sources::FormatOptions;
use crate::workflow::WorkflowConfig;

/// Upper bound accepted for `SEARCH_MAX_RETRIES`
pub const MAX_SEARCH_RETRIES: u32 = 10;

/// Supported completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAi => "openai",
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "llama3.2",
            LlmProvider::OpenAi => "gpt-4o",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" => Ok(LlmProvider::OpenAi),
            other => anyhow::bail!("Unknown LLM provider '{}' (expected 'openai' or 'ollama')", other),
        }
    }
}

/// Main configuration for the researcher
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: LlmProvider,

    pub model: String,

    /// Ollama server URL, only used with the Ollama provider
    pub ollama_host: String,

    /// 0.0 = deterministic; structured extraction works best low
    pub temperature: f64,

    pub tavily_api_key: Option<String>,

    /// Maximum queries produced by one query-generation pass
    pub max_search_queries: usize,

    /// Maximum reflection-triggered cycles
    pub max_reflections: u32,

    pub max_results_per_query: u32,

    pub recency_days: u32,

    pub search_depth: SearchDepth,

    pub topic: Topic,

    /// Raw content is capped at `max_tokens_per_source * 4` characters
    pub max_tokens_per_source: usize,

    pub include_raw_content: bool,

    pub search_timeout_secs: u64,

    pub search_max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: LlmProvider::OpenAi.default_model().to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.0,
            tavily_api_key: None,
            max_search_queries: 3,
            max_reflections: 2,
            max_results_per_query: 3,
            recency_days: 360,
            search_depth: SearchDepth::Basic,
            topic: Topic::General,
            max_tokens_per_source: 1000,
            include_raw_content: true,
            search_timeout_secs: 30,
            search_max_retries: 3,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if one exists.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup; `from_env` uses the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = lookup("LLM_PROVIDER") {
            config.provider = val.parse()?;
            config.model = config.provider.default_model().to_string();
        }

        if let Some(val) = lookup("LLM_MODEL") {
            config.model = val;
        }

        if let Some(val) = lookup("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Some(val) = lookup("LLM_TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("LLM_TEMPERATURE must be a valid floating-point number (e.g., 0.2)")?;
        }

        config.tavily_api_key = lookup("TAVILY_API_KEY").filter(|k| !k.trim().is_empty());

        if let Some(val) = lookup("MAX_SEARCH_QUERIES") {
            config.max_search_queries = val
                .parse()
                .context("MAX_SEARCH_QUERIES must be a valid positive integer")?;
        }

        if let Some(val) = lookup("MAX_REFLECTIONS") {
            config.max_reflections = val
                .parse()
                .context("MAX_REFLECTIONS must be a valid non-negative integer")?;
        }

        if let Some(val) = lookup("MAX_RESULTS_PER_QUERY") {
            config.max_results_per_query = val
                .parse()
                .context("MAX_RESULTS_PER_QUERY must be a valid positive integer")?;
        }

        if let Some(val) = lookup("SEARCH_RECENCY_DAYS") {
            config.recency_days = val
                .parse()
                .context("SEARCH_RECENCY_DAYS must be a valid positive integer")?;
        }

        if let Some(val) = lookup("SEARCH_DEPTH") {
            config.search_depth = val.parse()?;
        }

        if let Some(val) = lookup("SEARCH_TOPIC") {
            config.topic = val.parse()?;
        }

        if let Some(val) = lookup("MAX_TOKENS_PER_SOURCE") {
            config.max_tokens_per_source = val
                .parse()
                .context("MAX_TOKENS_PER_SOURCE must be a valid positive integer")?;
        }

        if let Some(val) = lookup("INCLUDE_RAW_CONTENT") {
            config.include_raw_content = val
                .parse()
                .context("INCLUDE_RAW_CONTENT must be 'true' or 'false'")?;
        }

        if let Some(val) = lookup("SEARCH_TIMEOUT_SECS") {
            config.search_timeout_secs = val
                .parse()
                .context("SEARCH_TIMEOUT_SECS must be a valid positive integer")?;
        }

        if let Some(val) = lookup("SEARCH_MAX_RETRIES") {
            config.search_max_retries = val
                .parse()
                .context("SEARCH_MAX_RETRIES must be a valid non-negative integer")?;
        }

        Ok(config)
    }

    /// Validate the configuration before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.model.trim().is_empty() {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }

        if self.max_search_queries == 0 {
            anyhow::bail!("MAX_SEARCH_QUERIES must be at least 1");
        }

        if !(1..=20).contains(&self.max_results_per_query) {
            anyhow::bail!(
                "MAX_RESULTS_PER_QUERY must be between 1 and 20, got: {}",
                self.max_results_per_query
            );
        }

        if self.max_tokens_per_source == 0 {
            anyhow::bail!("MAX_TOKENS_PER_SOURCE must be at least 1");
        }

        if self.search_timeout_secs == 0 {
            anyhow::bail!("SEARCH_TIMEOUT_SECS must be at least 1");
        }

        if self.search_max_retries > MAX_SEARCH_RETRIES {
            anyhow::bail!(
                "SEARCH_MAX_RETRIES must be at most {}, got: {}",
                MAX_SEARCH_RETRIES,
                self.search_max_retries
            );
        }

        Ok(())
    }

    /// Check the credentials the binary needs to reach both services
    pub fn validate_credentials(&self) -> Result<()> {
        if self.tavily_api_key.is_none() {
            anyhow::bail!("TAVILY_API_KEY is not set");
        }

        if self.provider == LlmProvider::OpenAi && env::var("OPENAI_API_KEY").is_err() {
            anyhow::bail!("OPENAI_API_KEY is not set (required for the openai provider)");
        }

        Ok(())
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            search_depth: self.search_depth,
            recency_days: Some(self.recency_days),
            max_results: self.max_results_per_query,
            include_raw_content: self.include_raw_content,
            topic: self.topic,
        }
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            max_tokens: self.max_tokens_per_source,
            include_raw_content: self.include_raw_content,
        }
    }

    /// The part of the configuration the workflow engine consumes
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            max_search_queries: self.max_search_queries,
            max_reflections: self.max_reflections,
            search: self.search_options(),
            format: self.format_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_search_queries, 3);
        assert_eq!(config.max_reflections, 2);
        assert_eq!(config.max_results_per_query, 3);
        assert_eq!(config.recency_days, 360);
        assert_eq!(config.max_tokens_per_source, 1000);
        assert!(config.include_raw_content);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_temperature() {
        let mut config = Config::default();
        config.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_limits() {
        let mut config = Config::default();
        config.max_search_queries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_results_per_query = 21;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search_max_retries = MAX_SEARCH_RETRIES;
        assert!(config.validate().is_ok());
        config.search_max_retries = MAX_SEARCH_RETRIES + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_switch_changes_default_model() {
        let config = Config::from_lookup(lookup_from(&[("LLM_PROVIDER", "Ollama")])).unwrap();
        assert_eq!(config.provider, LlmProvider::Ollama);
        assert_eq!(config.model, "llama3.2");

        let config = Config::from_lookup(lookup_from(&[
            ("LLM_PROVIDER", "ollama"),
            ("LLM_MODEL", "qwen2.5"),
        ]))
        .unwrap();
        assert_eq!(config.model, "qwen2.5");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("MAX_SEARCH_QUERIES", "5"),
            ("MAX_REFLECTIONS", "1"),
            ("SEARCH_DEPTH", "advanced"),
            ("SEARCH_TOPIC", "news"),
            ("INCLUDE_RAW_CONTENT", "false"),
            ("TAVILY_API_KEY", "tvly-test"),
        ]))
        .unwrap();

        assert_eq!(config.max_search_queries, 5);
        assert_eq!(config.max_reflections, 1);
        assert_eq!(config.search_depth, SearchDepth::Advanced);
        assert_eq!(config.topic, Topic::News);
        assert!(!config.include_raw_content);
        assert_eq!(config.tavily_api_key.as_deref(), Some("tvly-test"));
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        assert!(Config::from_lookup(lookup_from(&[("LLM_PROVIDER", "gemini")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("MAX_REFLECTIONS", "two")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SEARCH_DEPTH", "deep")])).is_err());
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = Config::from_lookup(lookup_from(&[("TAVILY_API_KEY", "  ")])).unwrap();
        assert!(config.tavily_api_key.is_none());
        assert!(config.validate_credentials().is_err());
    }

    #[test]
    fn test_workflow_config_projection() {
        let config = Config::default();
        let workflow = config.workflow_config();

        assert_eq!(workflow.max_search_queries, 3);
        assert_eq!(workflow.max_reflections, 2);
        assert_eq!(workflow.search.recency_days, Some(360));
        assert_eq!(workflow.format.max_tokens, 1000);
        assert!(workflow.format.include_raw_content);
    }
}
