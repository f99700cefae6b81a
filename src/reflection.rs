//! Reflection policy
//!
//! Decides, from one verdict, whether a run ends or goes around again. The
//! policy is a pure function of the verdict, the current context and the
//! reflection cap, so the cycle bound can be checked without any services.

use tracing::info;

use crate::completion::ReflectionRequest;
use crate::context::{PersonRecord, ReflectionVerdict, ResearchContext};

/// Default cap on reflection-triggered cycles
pub const DEFAULT_MAX_REFLECTIONS: u32 = 2;

/// What the Reflect state does next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionDecision {
    /// The verdict accepted the record
    Satisfied(PersonRecord),
    /// Unsatisfactory, but the cap is reached; the verdict's suggestions are dropped
    CapReached(PersonRecord),
    /// Another cycle was scheduled with the verdict's queries
    Retry,
}

impl ReflectionDecision {
    /// The final record, if the run ends here
    pub fn into_record(self) -> Option<PersonRecord> {
        match self {
            ReflectionDecision::Satisfied(record) | ReflectionDecision::CapReached(record) => {
                Some(record)
            }
            ReflectionDecision::Retry => None,
        }
    }
}

/// Build the reflection input: notes joined by newlines and the current record
pub fn reflection_request(ctx: &ResearchContext) -> ReflectionRequest {
    ReflectionRequest {
        notes: ctx.notes().join("\n"),
        info: ctx.extracted_info.clone(),
    }
}

/// Apply a verdict to the context.
///
/// - satisfactory: finish with the current record (or the default record)
/// - unsatisfactory below the cap: bump `reflection_count`, install the
///   verdict's queries, and retry
/// - unsatisfactory at the cap: finish anyway
pub fn apply_verdict(
    verdict: ReflectionVerdict,
    mut ctx: ResearchContext,
    max_reflections: u32,
) -> (ReflectionDecision, ResearchContext) {
    if verdict.is_satisfactory {
        let record = ctx.record_or_default();
        return (ReflectionDecision::Satisfied(record), ctx);
    }

    if ctx.reflection_count() < max_reflections {
        let num_queries = verdict.next_queries.len();
        ctx.schedule_cycle(verdict);
        info!(
            cycle = ctx.reflection_count(),
            num_queries,
            "Starting reflection cycle {} with {} new queries",
            ctx.reflection_count(),
            num_queries
        );
        return (ReflectionDecision::Retry, ctx);
    }

    info!(
        cycle = ctx.reflection_count(),
        "Max reflection cycles reached, ending with current info"
    );
    let record = ctx.record_or_default();
    (ReflectionDecision::CapReached(record), ctx)
}
