//! Context assembler: turns ranked results into a bounded context block.
//!
//! # Algorithm
//!
//! Results are taken in ranking order. Each one's text is truncated to
//! `max_chars_per_result` characters and costed as a word count. The first
//! result whose cost would push the running total past the budget ends
//! assembly: it is excluded entirely and so is everything after it. Results
//! are never split to fit.

use folio_config::ContextConfig;
use folio_core::source::{SearchResult, SourceProvenance, SourceType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::token;

/// Text used when nothing relevant was retrieved.
pub const NO_INFORMATION: &str = "No relevant information was found for this question.";

const ELLIPSIS: &str = "...";

// ── Types ──────────────────────────────────────────────────────────────────

/// The context handed to the prompt composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    /// Rendered context, bounded by the token budget
    pub text: String,

    /// Provenance of included results, in inclusion order
    pub sources_used: Vec<SourceProvenance>,

    /// Approximate token (word) count of the included result texts
    pub token_count: usize,
}

impl ContextBlock {
    /// Whether no result made it into the block.
    pub fn is_empty(&self) -> bool {
        self.sources_used.is_empty()
    }

    /// Lowest and highest relevance among included sources.
    pub fn relevance_range(&self) -> Option<(f32, f32)> {
        self.sources_used.iter().fold(None, |range, s| {
            let score = s.relevance_score;
            Some(match range {
                None => (score, score),
                Some((lo, hi)) => (lo.min(score), hi.max(score)),
            })
        })
    }
}

// ── Assembler ──────────────────────────────────────────────────────────────

/// Builds [`ContextBlock`]s under a per-result character cap.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars_per_result: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            max_chars_per_result: 800,
        }
    }
}

impl ContextAssembler {
    pub fn new(max_chars_per_result: usize) -> Self {
        Self {
            max_chars_per_result,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_chars_per_result)
    }

    /// Assemble `results` (already ranked) into a block of at most `max_tokens` words.
    pub fn build(&self, results: &[SearchResult], max_tokens: usize) -> ContextBlock {
        if results.is_empty() {
            return ContextBlock {
                text: NO_INFORMATION.into(),
                sources_used: Vec::new(),
                token_count: 0,
            };
        }

        let mut entries = Vec::new();
        let mut sources_used = Vec::new();
        let mut used = 0;

        for result in results {
            let content = truncate_chars(&result.content_text, self.max_chars_per_result);
            let cost = token::count(&content);
            if used + cost > max_tokens {
                debug!(
                    included = entries.len(),
                    remaining = results.len() - entries.len(),
                    used,
                    max_tokens,
                    "Context budget reached"
                );
                break;
            }

            entries.push(format!("{}\n{}", label(result), content));
            sources_used.push(SourceProvenance::from(result));
            used += cost;
        }

        if entries.is_empty() {
            return ContextBlock {
                text: NO_INFORMATION.into(),
                sources_used,
                token_count: 0,
            };
        }

        ContextBlock {
            text: entries.join("\n\n"),
            sources_used,
            token_count: used,
        }
    }
}

fn label(result: &SearchResult) -> String {
    let kind = match result.source_type {
        SourceType::Document => "Document",
        SourceType::Chunk => "Fragment",
        SourceType::Portfolio => "Portfolio",
        SourceType::Other(_) => "Source",
    };
    format!("[{kind}: {}]", result.source_label)
}

/// Cut `text` to `max_chars` characters, marking the cut with an ellipsis.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", text[..byte_idx].trim_end()),
        None => text.to_string(),
    }
}
