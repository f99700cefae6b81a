//! Rig-backed completion backend
//!
//! Bridges [`LlmBackend`] to Rig's native provider clients. A fresh Rig
//! agent is built for every request so each call site keeps its own
//! preamble while sharing one client.

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{ollama, openai};
use tracing::debug;

use crate::completion::{CompletionRequest, LlmBackend};
use crate::config::{Config, LlmProvider};
use crate::error::CompletionError;

enum RigClient {
    Ollama(ollama::Client),
    OpenAi(openai::Client),
}

/// Text completion through a Rig provider client
pub struct RigBackend {
    client: RigClient,
    provider: LlmProvider,
    model: String,
    temperature: Option<f64>,
}

impl RigBackend {
    /// Local models served by Ollama at `host`
    pub fn ollama(host: &str, model: impl Into<String>) -> Self {
        // Rig reads the Ollama endpoint from OLLAMA_API_BASE_URL,
        // defaulting to http://localhost:11434
        std::env::set_var("OLLAMA_API_BASE_URL", host);

        Self {
            client: RigClient::Ollama(ollama::Client::from_env()),
            provider: LlmProvider::Ollama,
            model: model.into(),
            temperature: None,
        }
    }

    /// OpenAI, authenticated through OPENAI_API_KEY
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            client: RigClient::OpenAi(openai::Client::from_env()),
            provider: LlmProvider::OpenAi,
            model: model.into(),
            temperature: None,
        }
    }

    /// Build the backend selected by the configuration.
    ///
    /// Call `Config::validate` first; it checks provider credentials.
    pub fn from_config(config: &Config) -> Self {
        let backend = match config.provider {
            LlmProvider::Ollama => Self::ollama(&config.ollama_host, &config.model),
            LlmProvider::OpenAi => Self::openai(&config.model),
        };
        backend.with_temperature(config.temperature)
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl LlmBackend for RigBackend {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        debug!(
            agent = request.agent,
            provider = self.name(),
            model = %self.model,
            "Prompting model"
        );

        let response = match &self.client {
            RigClient::Ollama(client) => {
                let mut builder = client.agent(&self.model).preamble(request.preamble);
                if let Some(temp) = self.temperature {
                    builder = builder.temperature(temp);
                }
                builder.build().prompt(request.prompt).await
            }
            RigClient::OpenAi(client) => {
                let mut builder = client.agent(&self.model).preamble(request.preamble);
                if let Some(temp) = self.temperature {
                    builder = builder.temperature(temp);
                }
                builder.build().prompt(request.prompt).await
            }
        };

        response.map_err(|e| {
            CompletionError::backend(request.agent, format!("{} completion failed: {}", self.name(), e))
        })
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_backend_implements_llm_backend() {
        fn assert_backend<T: LlmBackend>() {}
        assert_backend::<RigBackend>();
    }

    #[test]
    fn test_ollama_backend_from_config() {
        let config = Config {
            provider: LlmProvider::Ollama,
            model: "llama3.2".to_string(),
            temperature: 0.2,
            ..Config::default()
        };
        let backend = RigBackend::from_config(&config);

        assert_eq!(backend.name(), "ollama");
        assert_eq!(backend.model(), "llama3.2");
        assert_eq!(backend.temperature, Some(0.2));
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY environment variable
    async fn test_openai_backend_complete() {
        let backend = RigBackend::openai("gpt-4o");
        let response = backend
            .complete(CompletionRequest {
                agent: "smoke",
                preamble: "Answer with one word.",
                prompt: "Say hello.",
            })
            .await
            .unwrap();

        assert!(!response.is_empty());
    }
}
