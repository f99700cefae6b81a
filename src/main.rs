//! # People Researcher CLI
//!
//! Researches one person and prints their work profile.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- --email ada@example.com --name "Ada Lovelace"
//! ```

use anyhow::{Context as _, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use people_researcher::{
    CompletionError, Config, LlmBackend, LlmProvider, ResearchAgents, ResearchError,
    ResearchWorkflow, RigBackend, SearchError, Subject, TavilyClient, UserNotes,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "people-researcher",
    version,
    about = "Researches a person on the web and fills a structured work profile",
    long_about = r#"
People Researcher

Given an email address (and any hints you have), this tool:
  1. Writes a few targeted web search queries
  2. Searches the web and takes notes on what it finds
  3. Extracts a structured work profile from the notes
  4. Reflects on the result and searches again (up to 2 more times)

PREREQUISITES:
  TAVILY_API_KEY must be set.
  OPENAI_API_KEY must be set for the openai provider (the default).
  For ollama, start the server and pull the model first.

EXAMPLES:
  people-researcher --email ada@example.com
  people-researcher --email ada@example.com --name "Ada Lovelace" --company "Analytical Engines"
  people-researcher --email ada@example.com --provider ollama --model llama3.2 --json
"#
)]
struct Args {
    /// Email address of the person to research
    #[arg(short = 'e', long = "email", value_name = "EMAIL")]
    email: String,

    #[arg(short = 'n', long = "name", help = "Full name, if known")]
    name: Option<String>,

    #[arg(short = 'c', long = "company", help = "Company, if known")]
    company: Option<String>,

    #[arg(long = "linkedin", help = "LinkedIn profile URL, if known")]
    linkedin: Option<String>,

    #[arg(short = 'r', long = "role", help = "Role, if known")]
    role: Option<String>,

    /// Free-form notes passed to every prompt
    #[arg(long = "notes")]
    notes: Option<String>,

    #[arg(long = "notes-context", default_value = "default_context")]
    notes_context: String,

    /// Model name (falls back to LLM_MODEL)
    #[arg(short = 'm', long = "model", env = "LLM_MODEL")]
    model: Option<String>,

    /// LLM provider: openai or ollama (falls back to LLM_PROVIDER)
    #[arg(short = 'p', long = "provider", env = "LLM_PROVIDER")]
    provider: Option<String>,

    /// Print the record as JSON
    #[arg(long = "json", default_value = "false")]
    json: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable verbose/debug logging",
        default_value = "false"
    )]
    verbose: bool,
}

impl Args {
    fn subject(&self) -> Subject {
        let mut subject = Subject::new(self.email.trim());
        if let Some(name) = &self.name {
            subject = subject.with_name(name);
        }
        if let Some(company) = &self.company {
            subject = subject.with_company(company);
        }
        if let Some(linkedin) = &self.linkedin {
            subject = subject.with_linkedin(linkedin);
        }
        if let Some(role) = &self.role {
            subject = subject.with_role(role);
        }
        if let Some(notes) = &self.notes {
            subject = subject.with_user_notes(UserNotes::new(notes, &self.notes_context));
        }
        subject
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, std::env::var("RUST_LOG").ok().as_deref())?;

    let mut config = Config::from_env()?;
    if let Some(provider) = &args.provider {
        let provider: LlmProvider = provider.parse()?;
        if provider != config.provider && args.model.is_none() {
            config.model = provider.default_model().to_string();
        }
        config.provider = provider;
    }
    if let Some(model) = &args.model {
        info!(model = %model, "Using model from command line");
        config.model = model.clone();
    }
    config.validate()?;
    config.validate_credentials()?;

    let api_key = config
        .tavily_api_key
        .clone()
        .context("TAVILY_API_KEY is required")?;
    let search = TavilyClient::new(api_key)
        .with_timeout(Duration::from_secs(config.search_timeout_secs))
        .with_max_retries(config.search_max_retries);

    let backend = RigBackend::from_config(&config);
    info!(
        provider = backend.name(),
        model = backend.model(),
        "Configuration loaded"
    );

    let agents = ResearchAgents::from_backend(Arc::new(backend), config.max_search_queries);
    let workflow = ResearchWorkflow::new(agents, Arc::new(search), config.workflow_config());

    match workflow.research_person(args.subject()).await {
        Ok(record) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("\n{}", "=".repeat(60));
                println!("PROFILE: {}", args.email);
                println!("{}\n", "=".repeat(60));
                println!("{}", record);
                println!("{}", "=".repeat(60));
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Research failed");
            eprintln!("\nResearch failed: {}", e);
            if let Some(hint) = failure_hint(&e, config.provider) {
                eprintln!("\nTip: {}", hint);
            }
            Err(e.into())
        }
    }
}

/// Suggest a fix for failures the user can act on
fn failure_hint(error: &ResearchError, provider: LlmProvider) -> Option<&'static str> {
    match error {
        ResearchError::Search(SearchError::Unauthorized | SearchError::MissingApiKey) => {
            Some("check that TAVILY_API_KEY is valid")
        }
        ResearchError::Search(
            SearchError::Connection(_) | SearchError::Timeout | SearchError::Network(_),
        ) => Some("check network access to api.tavily.com"),
        ResearchError::Completion(CompletionError::Backend { .. }) => match provider {
            LlmProvider::Ollama => {
                Some("make sure Ollama is running (`ollama serve`) and the model is pulled")
            }
            LlmProvider::OpenAi => {
                Some("check that OPENAI_API_KEY is valid and the model name exists")
            }
        },
        _ => None,
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Filter directives: `--verbose` turns on DEBUG for this crate and wins over
/// `RUST_LOG`; otherwise `RUST_LOG` applies, defaulting to `info`.
fn log_directives(verbose: bool, rust_log: Option<&str>) -> String {
    match (verbose, rust_log) {
        (true, _) => "info,people_researcher=debug".to_string(),
        (false, Some(directives)) if !directives.trim().is_empty() => directives.to_string(),
        (false, _) => "info".to_string(),
    }
}

/// Log to stderr so stdout carries only the record
fn init_logging(verbose: bool, rust_log: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_new(log_directives(verbose, rust_log))
        .context("Invalid RUST_LOG directives")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test", "--email", "ada@example.com"]);
        assert_eq!(args.email, "ada@example.com");
        assert_eq!(args.notes_context, "default_context");
        assert!(!args.json);
        assert!(!args.verbose);

        let subject = args.subject();
        assert_eq!(subject, Subject::new("ada@example.com"));
    }

    #[test]
    fn test_args_with_hints() {
        let args = Args::parse_from([
            "test",
            "--email",
            "ada@example.com",
            "--name",
            "Ada Lovelace",
            "--company",
            "Analytical Engines",
            "--notes",
            "met at a conference",
            "--provider",
            "ollama",
            "--json",
        ]);

        assert_eq!(args.provider.as_deref(), Some("ollama"));
        assert!(args.json);

        let subject = args.subject();
        assert_eq!(subject.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(subject.company.as_deref(), Some("Analytical Engines"));
        assert_eq!(
            subject.user_notes,
            Some(UserNotes::new("met at a conference", "default_context"))
        );
    }

    #[test]
    fn test_verbose_overrides_rust_log() {
        assert_eq!(
            log_directives(true, Some("warn")),
            "info,people_researcher=debug"
        );
        assert_eq!(log_directives(false, Some("warn")), "warn");
        assert_eq!(log_directives(false, Some("  ")), "info");
        assert_eq!(log_directives(false, None), "info");
    }

    #[test]
    fn test_failure_hint_follows_error_variant() {
        let unreachable = ResearchError::Completion(CompletionError::backend(
            "extractor",
            "connection refused",
        ));
        assert_eq!(
            failure_hint(&unreachable, LlmProvider::Ollama),
            Some("make sure Ollama is running (`ollama serve`) and the model is pulled")
        );
        assert!(failure_hint(&unreachable, LlmProvider::OpenAi)
            .unwrap()
            .contains("OPENAI_API_KEY"));

        let offline = ResearchError::Search(SearchError::Connection("dns".to_string()));
        assert!(failure_hint(&offline, LlmProvider::OpenAi)
            .unwrap()
            .contains("tavily"));

        // Mentions "connection" in its message but is not a transport failure
        let schema = ResearchError::Completion(CompletionError::schema(
            "extractor",
            "connection field missing",
        ));
        assert_eq!(failure_hint(&schema, LlmProvider::Ollama), None);
        assert_eq!(failure_hint(&ResearchError::NoQueries, LlmProvider::Ollama), None);
    }

    #[test]
    fn test_email_is_required() {
        assert!(Args::try_parse_from(["test", "--name", "Ada"]).is_err());
    }
}
