//! Research context and record types
//!
//! A [`ResearchContext`] is created once per run, owned by that run, and
//! threaded through every workflow state. The record types are what the
//! completion service is asked to produce; the JSON Schema derived from
//! their serde shape is what the model is shown.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// SUBJECT
// =============================================================================

/// Free-text notes supplied by the caller once, at the start of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotes {
    pub additional: String,
    pub context: String,
}

impl UserNotes {
    pub fn new(additional: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            additional: additional.into(),
            context: context.into(),
        }
    }
}

impl fmt::Display for UserNotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (context: {})", self.additional, self.context)
    }
}

/// The person being researched. Email is the only required identifier;
/// everything else is a hint for query generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub linkedin: Option<String>,
    pub role: Option<String>,
    pub user_notes: Option<UserNotes>,
}

impl Subject {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            company: None,
            linkedin: None,
            role: None,
            user_notes: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_linkedin(mut self, linkedin: impl Into<String>) -> Self {
        self.linkedin = Some(linkedin.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_user_notes(mut self, notes: UserNotes) -> Self {
        self.user_notes = Some(notes);
        self
    }

    /// One-line description used in prompts.
    ///
    /// Fields appear in a fixed order and absent hints are skipped:
    /// `Email: a@b.com Name: Ada LinkedIn URL: ... Role: ... Company: ...`
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("Email: {}", self.email)];
        if let Some(name) = non_empty(&self.name) {
            parts.push(format!("Name: {}", name));
        }
        if let Some(linkedin) = non_empty(&self.linkedin) {
            parts.push(format!("LinkedIn URL: {}", linkedin));
        }
        if let Some(role) = non_empty(&self.role) {
            parts.push(format!("Role: {}", role));
        }
        if let Some(company) = non_empty(&self.company) {
            parts.push(format!("Company: {}", company));
        }
        parts.join(" ")
    }

    /// User notes as prompt text, `None` when absent
    pub fn user_notes_text(&self) -> String {
        self.user_notes
            .as_ref()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "None".to_string())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// STRUCTURED RECORD
// =============================================================================

/// One prior position in the subject's employment history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Employment {
    /// Company name
    pub name: String,
    /// Job title held there
    pub role: String,
    /// Four-digit year the position started
    pub year_started: i32,
    /// Four-digit year the position ended, or null if ongoing or unknown
    #[serde(default)]
    pub year_ended: Option<i32>,
}

/// The structured profile a run produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PersonRecord {
    /// Total years of professional experience
    pub years_experience: u32,
    /// The company the person works at now
    pub current_company: String,
    /// Current job title
    pub role: String,
    /// Earlier positions, most recent first
    pub prior_companies: Vec<Employment>,
    /// Any other relevant notes about the person
    pub notes: String,
}

impl PersonRecord {
    /// Record returned when no extraction ever produced one
    pub fn unknown() -> Self {
        Self {
            years_experience: 0,
            current_company: "Unknown".to_string(),
            role: "Unknown".to_string(),
            prior_companies: Vec::new(),
            notes: "No information available".to_string(),
        }
    }
}

/// Pretty-printed JSON Schema of `T`, derived from its serde shape
pub fn schema_json<T: JsonSchema>() -> String {
    format!("{:#}", schema_for!(T).as_value())
}

impl fmt::Display for PersonRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current company:  {}", self.current_company)?;
        writeln!(f, "Role:             {}", self.role)?;
        writeln!(f, "Years experience: {}", self.years_experience)?;
        if self.prior_companies.is_empty() {
            writeln!(f, "Prior companies:  none found")?;
        } else {
            writeln!(f, "Prior companies:")?;
            for job in &self.prior_companies {
                let ended = job
                    .year_ended
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "present".to_string());
                writeln!(
                    f,
                    "  - {} at {} ({} - {})",
                    job.role, job.name, job.year_started, ended
                )?;
            }
        }
        write!(f, "Notes:            {}", self.notes)
    }
}

// =============================================================================
// COMPLETION OUTPUTS
// =============================================================================

/// Output of the query-generation call site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedQueries {
    /// Web search queries, most useful first
    pub queries: Vec<String>,
}

/// Judgment of completeness produced at the end of each cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReflectionVerdict {
    /// Whether every field is present and sufficiently populated
    pub is_satisfactory: bool,
    /// Names of fields that are missing or incomplete
    #[serde(default)]
    pub missing_fields: BTreeSet<String>,
    /// Follow-up search queries; only meaningful when unsatisfactory
    #[serde(default, alias = "search_queries")]
    pub next_queries: Vec<String>,
    /// Short explanation of the verdict
    #[serde(default)]
    pub reasoning: String,
}

impl ReflectionVerdict {
    pub fn satisfied(reasoning: impl Into<String>) -> Self {
        Self {
            is_satisfactory: true,
            missing_fields: BTreeSet::new(),
            next_queries: Vec::new(),
            reasoning: reasoning.into(),
        }
    }

    pub fn unsatisfied<I, S>(missing: I, next_queries: Vec<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            is_satisfactory: false,
            missing_fields: missing.into_iter().map(Into::into).collect(),
            next_queries,
            reasoning: String::new(),
        }
    }
}

// =============================================================================
// RESEARCH CONTEXT
// =============================================================================

/// Mutable state of one research run.
///
/// `notes` is append-only and `reflection_count` only moves up; both are
/// private so the only way to change them is through the workflow steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchContext {
    subject: Subject,
    notes: Vec<String>,
    /// Queries for the next Research step, replaced wholesale each cycle
    pub search_queries: Vec<String>,
    /// Latest extraction, overwritten by every Extract step
    pub extracted_info: Option<PersonRecord>,
    missing_fields: BTreeSet<String>,
    reflection_count: u32,
}

impl ResearchContext {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            notes: Vec::new(),
            search_queries: Vec::new(),
            extracted_info: None,
            missing_fields: BTreeSet::new(),
            reflection_count: 0,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Notes as extraction input
    pub fn joined_notes(&self) -> String {
        self.notes.join("\n\n")
    }

    pub fn reflection_count(&self) -> u32 {
        self.reflection_count
    }

    /// Fields the last unsatisfactory verdict flagged as missing
    pub fn missing_fields(&self) -> &BTreeSet<String> {
        &self.missing_fields
    }

    /// Record a reflection-triggered cycle: bump the counter and install
    /// the verdict's queries as the pending batch.
    pub(crate) fn schedule_cycle(&mut self, verdict: ReflectionVerdict) {
        self.reflection_count += 1;
        self.search_queries = verdict.next_queries;
        self.missing_fields = verdict.missing_fields;
    }

    /// The extracted record, or the default record if extraction never ran
    pub fn record_or_default(&self) -> PersonRecord {
        self.extracted_info
            .clone()
            .unwrap_or_else(PersonRecord::unknown)
    }
}
