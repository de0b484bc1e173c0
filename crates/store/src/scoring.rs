//! Lexical relevance shared by every backend.
//!
//! A record's score is the fraction of significant query terms (stop words
//! and short tokens removed) that prefix-match a term of its searchable
//! text. Scores live in `[0, 1]` and do not depend on how common a term is
//! across the group, so a group holding a single entry scores the same as
//! a large one.

use folio_core::keywords;
use folio_core::source::{MatchField, SourceRecord};

/// Significant terms of a visitor question, in order of first appearance.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    keywords::extract_any(query)
}

/// Lowercased alphanumeric terms of `text`, ignoring single characters.
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Everything lexical search looks at for one record.
pub(crate) fn searchable_text(record: &SourceRecord) -> String {
    match record {
        SourceRecord::Document {
            title,
            content,
            tags,
            ..
        } => format!("{title} {content} {}", tags.join(" ")),
        SourceRecord::Fragment {
            document_title,
            text,
            ..
        } => format!("{document_title} {text}"),
        SourceRecord::Portfolio {
            title,
            description,
            technologies,
            ..
        } => format!("{title} {description} {}", technologies.join(" ")),
        SourceRecord::Other { label, content, .. } => format!("{label} {content}"),
    }
}

/// Fraction of `query_terms` found in the record's searchable text.
pub(crate) fn coverage(query_terms: &[String], record: &SourceRecord) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let haystack = terms(&searchable_text(record));
    let hits = query_terms
        .iter()
        .filter(|t| haystack.iter().any(|h| h.starts_with(t.as_str())))
        .count();
    hits as f32 / query_terms.len() as f32
}

/// Which field of `record` contains `keyword` (already lowercased), by precedence.
pub(crate) fn matched_field(record: &SourceRecord, keyword: &str) -> Option<MatchField> {
    let has = |s: &str| s.to_lowercase().contains(keyword);
    let (content, tags, other): (&str, &[String], &str) = match record {
        SourceRecord::Document {
            title,
            content,
            tags,
            ..
        } => (content.as_str(), tags.as_slice(), title.as_str()),
        SourceRecord::Fragment {
            document_title,
            text,
            ..
        } => (text.as_str(), &[][..], document_title.as_str()),
        SourceRecord::Portfolio {
            title,
            description,
            technologies,
            ..
        } => (description.as_str(), technologies.as_slice(), title.as_str()),
        SourceRecord::Other { label, content, .. } => (content.as_str(), &[][..], label.as_str()),
    };

    if has(content) {
        Some(MatchField::Content)
    } else if tags.iter().any(|t| has(t)) {
        Some(MatchField::Tag)
    } else if has(other) {
        Some(MatchField::Other)
    } else {
        None
    }
}
