//! Source aggregation
//!
//! Fans a query batch out to the search client, merges the per-query result
//! lists, drops repeated urls, and renders one bounded text block for the
//! note taker.
//!
//! ```text
//! queries ──▶ search ┐
//!         ──▶ search ├─▶ try_join_all ─▶ dedup (first url wins) ─▶ format
//!         ──▶ search ┘   (fail fast)
//! ```

use futures::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, info, info_span};

use crate::error::SearchError;
use crate::search::{SearchClient, SearchOptions, SourceDocument};

/// Appended to raw content cut at the character budget
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Characters of raw content allowed per token of budget
const CHARS_PER_TOKEN: usize = 4;

/// How sources are rendered for the note taker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Raw content is capped at `max_tokens * 4` characters
    pub max_tokens: usize,
    pub include_raw_content: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            include_raw_content: true,
        }
    }
}

impl FormatOptions {
    pub fn char_budget(&self) -> usize {
        self.max_tokens.saturating_mul(CHARS_PER_TOKEN)
    }
}

/// Run every query concurrently and wait for all of them.
///
/// Results come back in query order. The first failure aborts the whole
/// batch; no partial results are returned.
pub async fn search_all(
    client: &dyn SearchClient,
    queries: &[String],
    options: &SearchOptions,
) -> Result<Vec<Vec<SourceDocument>>, SearchError> {
    let searches = queries.iter().map(|query| {
        debug!(query = %query, "Dispatching search");
        client.search(query, options)
    });
    try_join_all(searches).await
}

/// Merge result lists, keeping the first document seen for each url.
///
/// Order is first-seen order across the lists concatenated in query order.
pub fn deduplicate(batches: Vec<Vec<SourceDocument>>) -> Vec<SourceDocument> {
    let _span = info_span!("deduplicating_sources", num_responses = batches.len()).entered();

    let initial: usize = batches.iter().map(Vec::len).sum();
    let mut seen_urls = HashSet::new();
    let unique: Vec<SourceDocument> = batches
        .into_iter()
        .flatten()
        .filter(|doc| seen_urls.insert(doc.url.clone()))
        .collect();

    info!(
        initial,
        unique = unique.len(),
        "Deduplicated {} sources to {} unique sources",
        initial,
        unique.len()
    );
    unique
}

/// Render sources as the note taker's input block.
///
/// Pure: the same sources and options always give the same bytes.
pub fn format_sources(sources: &[SourceDocument], options: &FormatOptions) -> String {
    let mut out = String::from("Sources:\n\n");

    for source in sources {
        out.push_str(&format!("Source {}:\n===\n", source.title));
        out.push_str(&format!("URL: {}\n===\n", source.url));
        out.push_str(&format!(
            "Most relevant content from source: {}\n===\n",
            source.content
        ));

        if options.include_raw_content {
            let raw = source.raw_content.as_deref().unwrap_or("");
            out.push_str(&format!(
                "Full source content limited to {} tokens: {}\n\n",
                options.max_tokens,
                truncate_chars(raw, options.char_budget())
            ));
        }
    }

    out.trim().to_string()
}

/// Cut `text` to at most `max_chars` characters, marking the cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Search, deduplicate and format in one step
pub async fn gather_sources(
    client: &dyn SearchClient,
    queries: &[String],
    search: &SearchOptions,
    format: &FormatOptions,
) -> Result<String, SearchError> {
    let batches = search_all(client, queries, search).await?;
    let unique = deduplicate(batches);
    Ok(format_sources(&unique, format))
}
