//! Research workflow engine
//!
//! A closed four-state cycle with an explicit terminal state:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌─────────┐    ┌─────────┐
//! │ QueryGen │ ─▶ │ Research │ ─▶ │ Extract │ ─▶ │ Reflect │ ─▶ Terminal(record)
//! └──────────┘    └──────────┘    └─────────┘    └────┬────┘
//!      ▲                                              │ unsatisfactory and
//!      └──────────────────────────────────────────────┘ under the cap
//! ```
//!
//! States run strictly one after another. The only concurrency is the
//! search fan-out inside Research. The context is moved into each
//! [`ResearchWorkflow::step`] and handed back with the next state, so a run
//! owns its context outright and nothing is shared between runs.

use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

use crate::completion::{NoteRequest, QueryRequest, ResearchAgents};
use crate::context::{PersonRecord, ResearchContext, Subject};
use crate::error::ResearchError;
use crate::reflection::{apply_verdict, reflection_request, DEFAULT_MAX_REFLECTIONS};
use crate::search::{SearchClient, SearchOptions};
use crate::sources::{gather_sources, FormatOptions};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Upper bound on queries kept from one generation pass
    pub max_search_queries: usize,
    /// Reflection-triggered cycles allowed before the run ends regardless
    pub max_reflections: u32,
    pub search: SearchOptions,
    pub format: FormatOptions,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_search_queries: 3,
            max_reflections: DEFAULT_MAX_REFLECTIONS,
            search: SearchOptions::default(),
            format: FormatOptions::default(),
        }
    }
}

/// Where a run is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    QueryGen,
    Research,
    Extract,
    Reflect,
    Terminal(PersonRecord),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::QueryGen => "query_gen",
            WorkflowState::Research => "research",
            WorkflowState::Extract => "extract",
            WorkflowState::Reflect => "reflect",
            WorkflowState::Terminal(_) => "terminal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Terminal(_))
    }
}

/// How many times each state ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub query_generations: u32,
    pub research_passes: u32,
    pub extractions: u32,
    pub reflections: u32,
}

impl RunStats {
    fn record(&mut self, state: &WorkflowState) {
        match state {
            WorkflowState::QueryGen => self.query_generations += 1,
            WorkflowState::Research => self.research_passes += 1,
            WorkflowState::Extract => self.extractions += 1,
            WorkflowState::Reflect => self.reflections += 1,
            WorkflowState::Terminal(_) => {}
        }
    }
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub record: PersonRecord,
    pub context: ResearchContext,
    pub stats: RunStats,
}

/// Drives one research run per call; holds no per-run state itself
pub struct ResearchWorkflow {
    agents: ResearchAgents,
    search: Arc<dyn SearchClient>,
    config: WorkflowConfig,
}

impl ResearchWorkflow {
    pub fn new(agents: ResearchAgents, search: Arc<dyn SearchClient>, config: WorkflowConfig) -> Self {
        Self {
            agents,
            search,
            config,
        }
    }

    /// Research a subject from scratch
    pub async fn research_person(&self, subject: Subject) -> Result<PersonRecord, ResearchError> {
        let span = info_span!("research_person", email = %subject.email, name = ?subject.name);
        async move {
            info!("Initialized research for {}", subject.email);
            let record = self.run(ResearchContext::new(subject)).await?;
            info!(company = %record.current_company, role = %record.role, "Completed research");
            Ok(record)
        }
        .instrument(span)
        .await
    }

    /// Run until a terminal state and return its record
    pub async fn run(&self, ctx: ResearchContext) -> Result<PersonRecord, ResearchError> {
        Ok(self.run_to_completion(ctx).await?.record)
    }

    /// Run until a terminal state, keeping the final context and stats
    pub async fn run_to_completion(
        &self,
        ctx: ResearchContext,
    ) -> Result<ResearchOutcome, ResearchError> {
        let mut state = WorkflowState::QueryGen;
        let mut ctx = ctx;
        let mut stats = RunStats::default();

        loop {
            if let WorkflowState::Terminal(record) = state {
                return Ok(ResearchOutcome {
                    record,
                    context: ctx,
                    stats,
                });
            }
            stats.record(&state);
            debug!(state = state.name(), cycle = ctx.reflection_count(), "Entering state");
            (state, ctx) = self.step(state, ctx).await?;
        }
    }

    /// Execute one state and return the next state with the updated context
    pub async fn step(
        &self,
        state: WorkflowState,
        ctx: ResearchContext,
    ) -> Result<(WorkflowState, ResearchContext), ResearchError> {
        match state {
            WorkflowState::QueryGen => {
                let span = info_span!("generating_queries", cycle = ctx.reflection_count());
                let ctx = self.generate_queries(ctx).instrument(span).await?;
                Ok((WorkflowState::Research, ctx))
            }
            WorkflowState::Research => {
                let span = info_span!("research_phase", num_queries = ctx.search_queries.len());
                let ctx = self.research(ctx).instrument(span).await?;
                Ok((WorkflowState::Extract, ctx))
            }
            WorkflowState::Extract => {
                let ctx = self
                    .extract(ctx)
                    .instrument(info_span!("extracting_information"))
                    .await?;
                Ok((WorkflowState::Reflect, ctx))
            }
            WorkflowState::Reflect => {
                let span = info_span!("reflection_phase", cycle = ctx.reflection_count());
                self.reflect(ctx).instrument(span).await
            }
            WorkflowState::Terminal(record) => Ok((WorkflowState::Terminal(record), ctx)),
        }
    }

    async fn generate_queries(
        &self,
        mut ctx: ResearchContext,
    ) -> Result<ResearchContext, ResearchError> {
        let request = QueryRequest {
            subject: ctx.subject().describe(),
            user_notes: ctx.subject().user_notes_text(),
            missing_fields: ctx.missing_fields().iter().cloned().collect(),
            suggested_queries: ctx.search_queries.clone(),
        };

        let generated = self.agents.query_writer.complete(&request).await?;
        let queries: Vec<String> = generated
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(self.config.max_search_queries)
            .collect();

        if !queries.is_empty() {
            ctx.search_queries = queries;
        } else if ctx.search_queries.is_empty() {
            return Err(ResearchError::NoQueries);
        } else {
            debug!("Query writer returned nothing, keeping reflection queries");
        }

        info!(
            num = ctx.search_queries.len(),
            "Generated {} search queries",
            ctx.search_queries.len()
        );
        Ok(ctx)
    }

    async fn research(&self, mut ctx: ResearchContext) -> Result<ResearchContext, ResearchError> {
        if ctx.search_queries.is_empty() {
            return Err(ResearchError::NoQueries);
        }

        let sources = gather_sources(
            self.search.as_ref(),
            &ctx.search_queries,
            &self.config.search,
            &self.config.format,
        )
        .await?;

        debug!("Processing search results with research agent");
        let request = NoteRequest {
            subject: ctx.subject().describe(),
            user_notes: ctx.subject().user_notes_text(),
            sources,
        };
        let notes = self.agents.note_taker.complete(&request).await?;

        info!(
            length = notes.len(),
            "Added {} characters of research notes",
            notes.len()
        );
        ctx.push_note(notes);
        Ok(ctx)
    }

    async fn extract(&self, mut ctx: ResearchContext) -> Result<ResearchContext, ResearchError> {
        let all_notes = ctx.joined_notes();
        debug!(length = all_notes.len(), "Processing notes");

        let record = self.agents.extractor.complete(&all_notes).await?;
        info!(
            company = %record.current_company,
            role = %record.role,
            prior = record.prior_companies.len(),
            "Extracted person information"
        );
        ctx.extracted_info = Some(record);
        Ok(ctx)
    }

    async fn reflect(
        &self,
        ctx: ResearchContext,
    ) -> Result<(WorkflowState, ResearchContext), ResearchError> {
        let verdict = self
            .agents
            .reflection
            .complete(&reflection_request(&ctx))
            .await?;

        info!(
            is_satisfactory = verdict.is_satisfactory,
            missing = verdict.missing_fields.len(),
            reasoning = %verdict.reasoning,
            "Reflection result: {}",
            verdict.is_satisfactory
        );

        let (decision, ctx) = apply_verdict(verdict, ctx, self.config.max_reflections);
        let next = match decision.into_record() {
            Some(record) => WorkflowState::Terminal(record),
            None => WorkflowState::QueryGen,
        };
        Ok((next, ctx))
    }
}
