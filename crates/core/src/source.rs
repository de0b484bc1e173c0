//! Retrieval sources: the text store contract and the records it returns.
//!
//! Different source groups expose their text under different fields
//! (a document's body, a fragment's chunk text, a portfolio entry's
//! description). The store hands back a tagged [`SourceRecord`] and each
//! variant has exactly one adapter into the common [`SearchResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// The kind of source a result came from. Doubles as the name of the
/// source group queried in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    /// A whole document (article, page)
    Document,
    /// A fragment of a document
    Chunk,
    /// A portfolio/profile entry
    Portfolio,
    /// Any source group a store adds beyond the built-in three
    Other(String),
}

impl SourceType {
    /// The built-in source groups, in default query order.
    pub fn builtin() -> Vec<SourceType> {
        vec![SourceType::Document, SourceType::Chunk, SourceType::Portfolio]
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Document => "document",
            Self::Chunk => "chunk",
            Self::Portfolio => "portfolio",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for SourceType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "document" | "documents" => Self::Document,
            "chunk" | "chunks" | "fragment" | "fragments" => Self::Chunk,
            "portfolio" => Self::Portfolio,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for SourceType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<SourceType> for String {
    fn from(t: SourceType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw row from one source group, carrying the store's native relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRecord {
    Document {
        id: String,
        title: String,
        content: String,
        #[serde(default)]
        tags: Vec<String>,
        score: f32,
    },
    Fragment {
        id: String,
        document_id: String,
        document_title: String,
        chunk_index: u32,
        text: String,
        score: f32,
    },
    Portfolio {
        id: String,
        title: String,
        description: String,
        #[serde(default)]
        technologies: Vec<String>,
        score: f32,
    },
    Other {
        source_type: String,
        id: String,
        label: String,
        content: String,
        score: f32,
    },
}

impl SourceRecord {
    /// The native relevance score reported by the store.
    pub fn score(&self) -> f32 {
        match self {
            Self::Document { score, .. }
            | Self::Fragment { score, .. }
            | Self::Portfolio { score, .. }
            | Self::Other { score, .. } => *score,
        }
    }

    /// Replace the native score (used by tiered keyword matching).
    pub fn with_score(mut self, value: f32) -> Self {
        match &mut self {
            Self::Document { score, .. }
            | Self::Fragment { score, .. }
            | Self::Portfolio { score, .. }
            | Self::Other { score, .. } => *score = value,
        }
        self
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Document { .. } => SourceType::Document,
            Self::Fragment { .. } => SourceType::Chunk,
            Self::Portfolio { .. } => SourceType::Portfolio,
            Self::Other { source_type, .. } => SourceType::from(source_type.as_str()),
        }
    }

    /// Normalize whichever content field this variant exposes into a [`SearchResult`].
    pub fn into_result(self) -> SearchResult {
        let source_type = self.source_type();
        match self {
            Self::Document { id, title, content, score, .. } => SearchResult {
                id,
                content_text: content,
                source_type,
                source_label: title,
                relevance_score: score.max(0.0),
            },
            Self::Fragment {
                id,
                document_title,
                chunk_index,
                text,
                score,
                ..
            } => SearchResult {
                id,
                content_text: text,
                source_type,
                source_label: format!("{document_title} (part {})", chunk_index + 1),
                relevance_score: score.max(0.0),
            },
            Self::Portfolio {
                id,
                title,
                description,
                technologies,
                score,
            } => {
                let content_text = if technologies.is_empty() {
                    description
                } else {
                    format!("{description}\nTechnologies: {}", technologies.join(", "))
                };
                SearchResult {
                    id,
                    content_text,
                    source_type,
                    source_label: title,
                    relevance_score: score.max(0.0),
                }
            }
            Self::Other { id, label, content, score, .. } => SearchResult {
                id,
                content_text: content,
                source_type,
                source_label: label,
                relevance_score: score.max(0.0),
            },
        }
    }
}

/// One retrieved unit, normalized across source groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier, unique within its source
    pub id: String,

    /// The text handed to the context assembler
    pub content_text: String,

    /// Which source group produced it
    pub source_type: SourceType,

    /// Human-readable origin (e.g. document title)
    pub source_label: String,

    /// Relevance score; comparable across sources only after boosting
    pub relevance_score: f32,
}

impl SearchResult {
    /// Identity of this result across all sources.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.source_type, self.id)
    }
}

/// Provenance of one result that made it into a context block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProvenance {
    pub source_type: SourceType,
    pub relevance_score: f32,
    pub id: String,
}

impl From<&SearchResult> for SourceProvenance {
    fn from(r: &SearchResult) -> Self {
        Self {
            source_type: r.source_type.clone(),
            relevance_score: r.relevance_score,
            id: r.id.clone(),
        }
    }
}

/// Which field a keyword matched in the substring fallback.
///
/// Ordered by precedence: a content match outranks a tag match, which
/// outranks a match anywhere else (title, label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Content,
    Tag,
    Other,
}

/// A substring/prefix hit from the keyword fallback path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub record: SourceRecord,
    pub field: MatchField,
}

/// The text store collaborator.
///
/// Implementations: SQLite with FTS5, in-memory (for testing).
#[async_trait]
pub trait TextStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Lexical relevance query restricted to one source group. Returns up to
    /// `limit` records whose native score exceeds `min_score`, best first.
    async fn lexical_search(
        &self,
        group: &SourceType,
        query: &str,
        min_score: f32,
        limit: usize,
    ) -> std::result::Result<Vec<SourceRecord>, StoreError>;

    /// Substring/prefix match of a single keyword within one source group.
    async fn keyword_search(
        &self,
        group: &SourceType,
        keyword: &str,
        limit: usize,
    ) -> std::result::Result<Vec<KeywordMatch>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_parses_aliases() {
        assert_eq!(SourceType::from("fragment"), SourceType::Chunk);
        assert_eq!(SourceType::from("Documents"), SourceType::Document);
        assert_eq!(SourceType::from("portfolio"), SourceType::Portfolio);
        assert_eq!(SourceType::from("talks"), SourceType::Other("talks".into()));
    }

    #[test]
    fn source_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&SourceType::Portfolio).unwrap();
        assert_eq!(json, "\"portfolio\"");
        let parsed: SourceType = serde_json::from_str("\"chunk\"").unwrap();
        assert_eq!(parsed, SourceType::Chunk);
    }

    #[test]
    fn fragment_adapter_uses_chunk_text_and_parent_title() {
        let record = SourceRecord::Fragment {
            id: "c7".into(),
            document_id: "d1".into(),
            document_title: "Curriculum".into(),
            chunk_index: 2,
            text: "Led the data platform team".into(),
            score: 0.5,
        };
        let result = record.into_result();
        assert_eq!(result.source_type, SourceType::Chunk);
        assert_eq!(result.content_text, "Led the data platform team");
        assert_eq!(result.source_label, "Curriculum (part 3)");
        assert_eq!(result.identity_key(), "chunk:c7");
    }

    #[test]
    fn portfolio_adapter_appends_technologies() {
        let record = SourceRecord::Portfolio {
            id: "p1".into(),
            title: "Shop".into(),
            description: "An online store".into(),
            technologies: vec!["Rust".into(), "Postgres".into()],
            score: 0.7,
        };
        let result = record.into_result();
        assert!(result.content_text.starts_with("An online store"));
        assert!(result.content_text.contains("Rust, Postgres"));
        assert_eq!(result.source_label, "Shop");
    }

    #[test]
    fn negative_native_scores_clamp_to_zero() {
        let record = SourceRecord::Document {
            id: "d".into(),
            title: "t".into(),
            content: "c".into(),
            tags: vec![],
            score: -1.5,
        };
        assert_eq!(record.into_result().relevance_score, 0.0);
    }

    #[test]
    fn with_score_replaces_native_score() {
        let record = SourceRecord::Other {
            source_type: "talks".into(),
            id: "t1".into(),
            label: "Talk".into(),
            content: "c".into(),
            score: 0.1,
        }
        .with_score(0.9);
        assert!((record.score() - 0.9).abs() < f32::EPSILON);
        assert_eq!(record.source_type(), SourceType::Other("talks".into()));
    }
}
