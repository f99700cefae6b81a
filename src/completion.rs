//! Structured completion call sites
//!
//! The workflow talks to the language model through four distinct
//! [`CompletionService`] instances, one per call site, each with its role
//! prompt and output shape fixed at construction:
//!
//! ```text
//! ┌──────────────┐  QueryRequest        ┌──────────────────┐
//! │ query_writer │ ───────────────────▶ │ GeneratedQueries │
//! ├──────────────┤  NoteRequest         ├──────────────────┤
//! │ note_taker   │ ───────────────────▶ │ String (notes)   │
//! ├──────────────┤  String (notes)      ├──────────────────┤
//! │ extractor    │ ───────────────────▶ │ PersonRecord     │
//! ├──────────────┤  ReflectionRequest   ├──────────────────┤
//! │ reflection   │ ───────────────────▶ │ ReflectionVerdict│
//! └──────────────┘                      └──────────────────┘
//!            │ all four delegate to
//!            ▼
//!     LlmBackend (text in, text out)
//! ```
//!
//! Tests replace a whole [`CompletionService`]; production code builds
//! [`LlmAgent`]s over an [`LlmBackend`] such as [`crate::llm::RigBackend`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::context::{GeneratedQueries, PersonRecord, ReflectionVerdict};
use crate::error::CompletionError;
use crate::prompts::ResearchPrompts;

// =============================================================================
// SERVICE TRAITS
// =============================================================================

/// One typed completion capability: input in, declared output shape out.
///
/// Failures are never retried by the workflow; they propagate.
#[async_trait]
pub trait CompletionService<I, O>: Send + Sync
where
    I: Sync,
    O: Send,
{
    async fn complete(&self, input: &I) -> Result<O, CompletionError>;
}

/// A single prompt sent to a text-completion backend
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Call-site name, used in errors and logs
    pub agent: &'a str,
    /// System prompt
    pub preamble: &'a str,
    /// User message
    pub prompt: &'a str,
}

/// Provider-agnostic text completion
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError>;

    /// Provider name for logging/debugging
    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

// =============================================================================
// CALL-SITE INPUTS
// =============================================================================

/// Renders a call-site input into the user message
pub trait PromptInput {
    fn render(&self) -> Result<String, String>;
}

/// Input of the query writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub subject: String,
    pub user_notes: String,
    /// Fields a previous reflection flagged as missing
    pub missing_fields: Vec<String>,
    /// Queries a previous reflection suggested
    pub suggested_queries: Vec<String>,
}

impl PromptInput for QueryRequest {
    fn render(&self) -> Result<String, String> {
        let mut out = format!(
            "Here is the person you are researching: {}\n\n<user_notes>\n{}\n</user_notes>",
            self.subject, self.user_notes
        );
        if !self.missing_fields.is_empty() {
            out.push_str(&format!(
                "\n\n<missing_fields>\n{}\n</missing_fields>",
                self.missing_fields.join(", ")
            ));
        }
        if !self.suggested_queries.is_empty() {
            out.push_str("\n\n<suggested_queries>\n");
            out.push_str(&self.suggested_queries.join("\n"));
            out.push_str("\n</suggested_queries>");
        }
        Ok(out)
    }
}

/// Input of the note taker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRequest {
    pub subject: String,
    pub user_notes: String,
    /// Deduplicated, formatted sources
    pub sources: String,
}

impl PromptInput for NoteRequest {
    fn render(&self) -> Result<String, String> {
        Ok(format!(
            "Person: {}\n\n<website_contents>\n{}\n</website_contents>\n\n\
             Here are any additional notes from the user:\n<user_notes>\n{}\n</user_notes>",
            self.subject, self.sources, self.user_notes
        ))
    }
}

/// Extraction input is the concatenated notes
impl PromptInput for String {
    fn render(&self) -> Result<String, String> {
        Ok(format!(
            "Here are all the notes from research:\n\n<web_research_notes>\n{}\n</web_research_notes>",
            self
        ))
    }
}

/// Input of the reflection analyst, sent as pretty JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionRequest {
    pub notes: String,
    pub info: Option<PersonRecord>,
}

impl PromptInput for ReflectionRequest {
    fn render(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

// =============================================================================
// OUTPUT PARSING
// =============================================================================

/// Turns raw model text into a call site's declared output
pub trait CompletionOutput: Sized {
    fn from_response(agent: &str, raw: &str) -> Result<Self, CompletionError>;
}

/// Free-text output: anything non-blank
impl CompletionOutput for String {
    fn from_response(agent: &str, raw: &str) -> Result<Self, CompletionError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse {
                agent: agent.to_string(),
            });
        }
        Ok(text.to_string())
    }
}

macro_rules! json_output {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl CompletionOutput for $ty {
                fn from_response(agent: &str, raw: &str) -> Result<Self, CompletionError> {
                    parse_json_output(agent, raw)
                }
            }
        )+
    };
}

json_output!(GeneratedQueries, PersonRecord, ReflectionVerdict);

fn parse_json_output<T: DeserializeOwned>(agent: &str, raw: &str) -> Result<T, CompletionError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(CompletionError::EmptyResponse {
            agent: agent.to_string(),
        });
    }

    let whole = match serde_json::from_str::<T>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    first_embedded_value(text).ok_or_else(|| CompletionError::schema(agent, whole))
}

/// Find the first `T` embedded in a model response.
///
/// Tries each `{` in turn and parses one value from there with a streaming
/// deserializer, so code fences, leading prose and trailing commentary
/// (braces included) around the object are ignored.
pub fn first_embedded_value<T: DeserializeOwned>(text: &str) -> Option<T> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<T>()
            .next()?
            .ok()
    })
}

// =============================================================================
// LLM AGENT
// =============================================================================

/// A call site bound to a backend with a fixed role prompt
pub struct LlmAgent<I, O> {
    name: &'static str,
    preamble: String,
    backend: Arc<dyn LlmBackend>,
    _io: PhantomData<fn(&I) -> O>,
}

impl<I, O> LlmAgent<I, O> {
    pub fn new(name: &'static str, preamble: impl Into<String>, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            name,
            preamble: preamble.into(),
            backend,
            _io: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O> CompletionService<I, O> for LlmAgent<I, O>
where
    I: PromptInput + Sync,
    O: CompletionOutput + Send,
{
    async fn complete(&self, input: &I) -> Result<O, CompletionError> {
        let prompt = input.render().map_err(|message| CompletionError::InvalidInput {
            agent: self.name.to_string(),
            message,
        })?;

        debug!(
            agent = self.name,
            provider = self.backend.name(),
            model = self.backend.model(),
            prompt_chars = prompt.len(),
            "Sending completion request"
        );

        let raw = self
            .backend
            .complete(CompletionRequest {
                agent: self.name,
                preamble: &self.preamble,
                prompt: &prompt,
            })
            .await?;

        O::from_response(self.name, &raw)
    }
}

// =============================================================================
// AGENT SET
// =============================================================================

/// The four call sites the workflow needs
#[derive(Clone)]
pub struct ResearchAgents {
    pub query_writer: Arc<dyn CompletionService<QueryRequest, GeneratedQueries>>,
    pub note_taker: Arc<dyn CompletionService<NoteRequest, String>>,
    pub extractor: Arc<dyn CompletionService<String, PersonRecord>>,
    pub reflection: Arc<dyn CompletionService<ReflectionRequest, ReflectionVerdict>>,
}

impl ResearchAgents {
    /// Build all four call sites over one backend
    pub fn from_backend(backend: Arc<dyn LlmBackend>, max_search_queries: usize) -> Self {
        Self {
            query_writer: Arc::new(LlmAgent::<QueryRequest, GeneratedQueries>::new(
                "query_generator",
                ResearchPrompts::query_writer(max_search_queries),
                backend.clone(),
            )),
            note_taker: Arc::new(LlmAgent::<NoteRequest, String>::new(
                "researcher",
                ResearchPrompts::note_taker(),
                backend.clone(),
            )),
            extractor: Arc::new(LlmAgent::<String, PersonRecord>::new(
                "extractor",
                ResearchPrompts::extractor(),
                backend.clone(),
            )),
            reflection: Arc::new(LlmAgent::<ReflectionRequest, ReflectionVerdict>::new(
                "reflection",
                ResearchPrompts::reflection(),
                backend,
            )),
        }
    }
}
