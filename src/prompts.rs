//! Role prompts for the four completion call sites
//!
//! Each prompt is fixed when its agent is constructed: the record schema
//! and the expected output shape are baked in. Per-run data (the subject,
//! sources, notes) travels in the user message instead.

use crate::context::{schema_json, GeneratedQueries, PersonRecord, ReflectionVerdict};

/// Prompt templates for the people research workflow
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Query writer: subject description in, `{"queries": [...]}` out
    pub fn query_writer(max_search_queries: usize) -> String {
        PromptBuilder::new(
            r#"You are a search query generator. You write targeted web search queries that gather specific information about one person.

Write at most {max_search_queries} search queries that will help fill in the following schema:

<schema>
{schema}
</schema>

Guidelines:
1. Make sure to look up the right name.
2. Use context clues about the company the person works at if it is not given outright.
3. Do not invent search terms that would make you miss the person's profile entirely.
4. If a LinkedIn URL is known, include the raw URL in a query; it leads straight to the right page.
5. When earlier research flagged missing fields or suggested queries, target those gaps first.

We are mainly interested in the person's work experience.

{output}"#,
        )
        .with("max_search_queries", max_search_queries.to_string())
        .with("schema", schema_json::<PersonRecord>())
        .with("output", json_only(&schema_json::<GeneratedQueries>()))
        .build()
    }

    /// Note taker: scraped sources in, free-text notes out
    pub fn note_taker() -> String {
        PromptBuilder::new(
            r#"You are doing web research on a person. The following schema shows the information we are interested in:

<schema>
{schema}
</schema>

You will be given scraped website content. Take clear, organized notes about the person, focusing on topics relevant to the schema.

Your notes should:
1. Be well organized and easy to read
2. Focus on topics mentioned in the schema
3. Include specific facts, dates, and figures when available
4. Stay faithful to the original content
5. Point out when important information is missing or unclear

Do not format the notes to match the schema. Just take clear notes that capture all relevant information."#,
        )
        .with("schema", schema_json::<PersonRecord>())
        .build()
    }

    /// Extractor: accumulated notes in, a record out
    pub fn extractor() -> String {
        PromptBuilder::new(
            r#"Your task is to take notes gathered from web research and extract them into the following schema.

<schema>
{schema}
</schema>

Use only what the notes support. When a value is unknown use "Unknown" for text fields, 0 for years of experience and null for an end year.

{output}"#,
        )
        .with("schema", schema_json::<PersonRecord>())
        .with("output", json_only("the <schema> above (fill in values, do not repeat the schema)"))
        .build()
    }

    /// Reflection analyst: notes + current record in, a verdict out
    pub fn reflection() -> String {
        PromptBuilder::new(
            r#"You are a research analyst reviewing the quality and completeness of extracted person information.

Compare the extracted information with the required schema:

<schema>
{schema}
</schema>

You will receive the research notes and the extracted information (null if nothing was extracted yet). Decide whether all required fields are present and sufficiently populated. Consider:
1. Are any required fields missing?
2. Are any fields incomplete or uncertain?
3. Do any fields hold placeholder values or "unknown" markers?

If the information is not satisfactory, suggest 1-3 targeted search queries that would find what is missing.

{output}"#,
        )
        .with("schema", schema_json::<PersonRecord>())
        .with("output", json_only(&schema_json::<ReflectionVerdict>()))
        .build()
    }
}

fn json_only(shape: &str) -> String {
    format!(
        "Respond with JSON only, no commentary, as an object matching:\n{}",
        shape
    )
}

/// Prompt builder for template substitution
///
/// Placeholders are formatted as `{name}`.
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute a placeholder with a value
    pub fn with(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let placeholder = format!("{{{}}}", name);
        self.template = self.template.replace(&placeholder, value.as_ref());
        self
    }

    pub fn build(self) -> String {
        self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_writer_bakes_limit_and_schema() {
        let prompt = ResearchPrompts::query_writer(4);
        assert!(prompt.contains("at most 4 search queries"));
        assert!(prompt.contains("prior_companies"));
        assert!(prompt.contains(r#""queries""#));
        assert!(!prompt.contains("{max_search_queries}"));
    }

    #[test]
    fn test_note_taker_is_free_text() {
        let prompt = ResearchPrompts::note_taker();
        assert!(prompt.contains("years_experience"));
        assert!(!prompt.contains("Respond with JSON only"));
    }

    #[test]
    fn test_structured_prompts_request_json() {
        for prompt in [ResearchPrompts::extractor(), ResearchPrompts::reflection()] {
            assert!(prompt.contains("Respond with JSON only"));
            assert!(!prompt.contains("{schema}"));
            assert!(!prompt.contains("{output}"));
        }
        assert!(ResearchPrompts::reflection().contains("is_satisfactory"));
        assert!(ResearchPrompts::reflection().contains("next_queries"));
    }

    #[test]
    fn test_prompt_builder_multiple_same_placeholder() {
        let prompt = PromptBuilder::new("{x} + {x} = {result}")
            .with("x", "2")
            .with("result", "4")
            .build();

        assert_eq!(prompt, "2 + 2 = 4");
    }
}
