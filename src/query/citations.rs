//! User-facing citations derived from retrieved passages.

use crate::knowledge_base::RetrievalResult;
use serde::Serialize;

/// Longest excerpt, in characters, kept in a citation.
pub const EXCERPT_LIMIT: usize = 200;

/// Excerpt and provenance for one retrieved passage.
///
/// Every field is always serialized; absent metadata becomes an empty string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// Passage text, truncated to [`EXCERPT_LIMIT`] characters plus `...`.
    pub text: String,
    /// Source document URL.
    pub source_url: String,
    /// Document title.
    pub title: String,
    /// Section heading.
    pub section: String,
    /// Relevance score from retrieval.
    pub relevance_score: f64,
}

impl From<&RetrievalResult> for Citation {
    fn from(result: &RetrievalResult) -> Self {
        let metadata = &result.metadata;
        Self {
            text: excerpt(&result.text),
            source_url: metadata.source_url.clone().unwrap_or_default(),
            title: metadata.title.clone().unwrap_or_default(),
            section: metadata.section.clone().unwrap_or_default(),
            relevance_score: result.score,
        }
    }
}

/// Truncate to [`EXCERPT_LIMIT`] characters, appending `...` when anything was cut.
pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Display-oriented citation with placeholder labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayCitation {
    /// Excerpt text.
    pub text: String,
    /// Source URL or `Unknown source`.
    pub source: String,
    /// Title or `No title`.
    pub title: String,
    /// Section or `No section`.
    pub section: String,
    /// Relevance rounded to three decimals.
    pub relevance: f64,
}

/// Relabel citations for display.
///
/// Not applied to query responses.
pub fn format_citations(citations: &[Citation]) -> Vec<DisplayCitation> {
    citations
        .iter()
        .map(|citation| DisplayCitation {
            text: citation.text.clone(),
            source: or_placeholder(&citation.source_url, "Unknown source"),
            title: or_placeholder(&citation.title, "No title"),
            section: or_placeholder(&citation.section, "No section"),
            relevance: (citation.relevance_score * 1000.0).round() / 1000.0,
        })
        .collect()
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}
