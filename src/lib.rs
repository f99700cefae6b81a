//! # People Researcher
//!
//! A schema-directed research agent: given a person's email (plus optional
//! hints), it searches the web, takes notes, and fills a fixed work-profile
//! schema, reflecting on the result and retrying a bounded number of times.
//!
//! ```text
//! QueryGen ─▶ Research ─▶ Extract ─▶ Reflect ─▶ PersonRecord
//!     ▲                                 │
//!     └──────── at most 2 retries ──────┘
//! ```
//!
//! ## Quick Start
//! ```ignore
//! use std::sync::Arc;
//! use people_researcher::{Config, ResearchAgents, ResearchWorkflow, RigBackend, Subject, TavilyClient};
//!
//! let config = Config::from_env()?;
//! let backend = Arc::new(RigBackend::from_config(&config));
//! let agents = ResearchAgents::from_backend(backend, config.max_search_queries);
//! let search = Arc::new(TavilyClient::from_env()?);
//! let workflow = ResearchWorkflow::new(agents, search, config.workflow_config());
//! let record = workflow.research_person(Subject::new("ada@example.com")).await?;
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Error types for completions, search and the workflow
pub mod error;

/// Environment-driven configuration
pub mod config;

/// Subject, record schema and per-run context
pub mod context;

/// System prompts for the four completion call sites
pub mod prompts;

/// Typed completion services over a text backend
pub mod completion;

/// Rig-backed LLM providers
pub mod llm;

/// Web search client
pub mod search;

/// Search fan-out, dedup and formatting
pub mod sources;

/// Reflection retry policy
pub mod reflection;

/// The state machine
pub mod workflow;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use completion::{CompletionService, LlmBackend, ResearchAgents};
pub use config::{Config, LlmProvider};
pub use context::{
    Employment, PersonRecord, ReflectionVerdict, ResearchContext, Subject, UserNotes,
};
pub use error::{CompletionError, ResearchError, SearchError};
pub use llm::RigBackend;
pub use search::{SearchClient, SearchOptions, SourceDocument, TavilyClient};
pub use sources::FormatOptions;
pub use workflow::{ResearchOutcome, ResearchWorkflow, RunStats, WorkflowConfig, WorkflowState};
