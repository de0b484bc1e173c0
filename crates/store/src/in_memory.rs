//! In-memory store: useful for testing and ephemeral deployments.
//!
//! Lexical relevance is the shared term coverage from [`crate::scoring`],
//! the same score the SQLite backend reports.

use crate::content::{
    ContentWriter, NewChunk, NewDocument, NewPortfolioEntry, NewSource, id_or_new,
};
use crate::scoring::{coverage, matched_field, query_terms};
use async_trait::async_trait;
use folio_core::error::StoreError;
use folio_core::history::{ConversationTurn, HistoryStore};
use folio_core::message::SessionId;
use folio_core::source::{KeywordMatch, SourceRecord, SourceType, TextStore};
use folio_core::template::{PromptTemplate, TemplateStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory store implementing every collaborator trait.
pub struct InMemoryStore {
    records: Arc<RwLock<Vec<SourceRecord>>>,
    turns: Arc<RwLock<Vec<ConversationTurn>>>,
    templates: Arc<RwLock<HashMap<String, PromptTemplate>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            turns: Arc::new(RwLock::new(Vec::new())),
            templates: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn upsert_record(&self, id: &str, record: SourceRecord) {
        let mut records = self.records.write().await;
        let group = record.source_type();
        records.retain(|r| !(r.source_type() == group && record_id(r) == id));
        records.push(record);
    }

    /// Number of stored conversation turns across all sessions.
    pub async fn turn_count(&self) -> usize {
        self.turns.read().await.len()
    }
}

fn record_id(record: &SourceRecord) -> &str {
    match record {
        SourceRecord::Document { id, .. }
        | SourceRecord::Fragment { id, .. }
        | SourceRecord::Portfolio { id, .. }
        | SourceRecord::Other { id, .. } => id,
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn lexical_search(
        &self,
        group: &SourceType,
        query: &str,
        min_score: f32,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let records = self.records.read().await;
        let mut results: Vec<SourceRecord> = records
            .iter()
            .filter(|r| &r.source_type() == group)
            .filter_map(|r| {
                let score = coverage(&terms, r);
                (score > min_score).then(|| r.clone().with_score(score))
            })
            .collect();

        results.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn keyword_search(
        &self,
        group: &SourceType,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<KeywordMatch>, StoreError> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Ok(vec![]);
        }

        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| &r.source_type() == group)
            .filter_map(|r| {
                matched_field(r, &keyword).map(|field| KeywordMatch {
                    record: r.clone(),
                    field,
                })
            })
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn append_turn(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        self.turns.write().await.push(turn);
        Ok(())
    }

    async fn recent_turns(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let turns = self.turns.read().await;
        // Appends arrive in order, so reverse insertion order is newest first.
        Ok(turns
            .iter()
            .rev()
            .filter(|t| &t.session_id == session_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TemplateStore for InMemoryStore {
    async fn active_template(&self, name: &str) -> Result<Option<PromptTemplate>, StoreError> {
        Ok(self
            .templates
            .read()
            .await
            .get(name)
            .filter(|t| t.is_active)
            .cloned())
    }

    async fn list_active_templates(&self) -> Result<Vec<PromptTemplate>, StoreError> {
        let mut active: Vec<PromptTemplate> = self
            .templates
            .read()
            .await
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
        Ok(active)
    }
}

#[async_trait]
impl ContentWriter for InMemoryStore {
    async fn put_document(&self, doc: NewDocument) -> Result<String, StoreError> {
        let id = id_or_new(doc.id);
        let record = SourceRecord::Document {
            id: id.clone(),
            title: doc.title,
            content: doc.content,
            tags: doc.tags,
            score: 0.0,
        };
        self.upsert_record(&id, record).await;
        Ok(id)
    }

    async fn put_chunk(&self, chunk: NewChunk) -> Result<String, StoreError> {
        let id = id_or_new(chunk.id);
        let document_title = self
            .records
            .read()
            .await
            .iter()
            .find_map(|r| match r {
                SourceRecord::Document { id, title, .. } if *id == chunk.document_id => {
                    Some(title.clone())
                }
                _ => None,
            })
            .unwrap_or_default();

        let record = SourceRecord::Fragment {
            id: id.clone(),
            document_id: chunk.document_id,
            document_title,
            chunk_index: chunk.chunk_index,
            text: chunk.text,
            score: 0.0,
        };
        self.upsert_record(&id, record).await;
        Ok(id)
    }

    async fn put_portfolio(&self, entry: NewPortfolioEntry) -> Result<String, StoreError> {
        let id = id_or_new(entry.id);
        let record = SourceRecord::Portfolio {
            id: id.clone(),
            title: entry.title,
            description: entry.description,
            technologies: entry.technologies,
            score: 0.0,
        };
        self.upsert_record(&id, record).await;
        Ok(id)
    }

    async fn put_source(&self, source: NewSource) -> Result<String, StoreError> {
        let group = SourceType::from(source.source_type.as_str());
        if matches!(
            group,
            SourceType::Document | SourceType::Chunk | SourceType::Portfolio
        ) {
            return Err(StoreError::UnsupportedSource(source.source_type));
        }

        let id = id_or_new(source.id);
        let record = SourceRecord::Other {
            source_type: group.as_str().to_string(),
            id: id.clone(),
            label: source.label,
            content: source.content,
            score: 0.0,
        };
        self.upsert_record(&id, record).await;
        Ok(id)
    }

    async fn put_template(&self, template: PromptTemplate) -> Result<(), StoreError> {
        self.templates
            .write()
            .await
            .insert(template.name.clone(), template);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use folio_core::source::MatchField;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .put_document(NewDocument {
                id: Some("cv".into()),
                title: "Curriculum".into(),
                content: "Backend engineer working with Rust and PostgreSQL".into(),
                tags: vec!["career".into()],
            })
            .await
            .unwrap();
        store
            .put_chunk(NewChunk {
                id: None,
                document_id: "cv".into(),
                chunk_index: 0,
                text: "Led the payments team".into(),
            })
            .await
            .unwrap();
        store
            .put_portfolio(NewPortfolioEntry {
                id: Some("shop".into()),
                title: "Online shop".into(),
                description: "Storefront with a custom checkout".into(),
                technologies: vec!["Rust".into(), "Svelte".into()],
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn lexical_search_is_scoped_to_group() {
        let store = seeded().await;
        let docs = store
            .lexical_search(&SourceType::Document, "rust engineer", 0.0, 10)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert!((docs[0].score() - 1.0).abs() < f32::EPSILON);

        let portfolio = store
            .lexical_search(&SourceType::Portfolio, "rust engineer", 0.0, 10)
            .await
            .unwrap();
        assert_eq!(portfolio.len(), 1);
        assert!((portfolio[0].score() - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn question_stop_words_are_not_counted() {
        let store = seeded().await;
        let results = store
            .lexical_search(
                &SourceType::Portfolio,
                "What experience do you have with Rust?",
                0.3,
                10,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score() - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn lexical_search_excludes_scores_at_threshold() {
        let store = seeded().await;
        let results = store
            .lexical_search(&SourceType::Portfolio, "rust engineer", 0.5, 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fragment_carries_parent_title() {
        let store = seeded().await;
        let results = store
            .lexical_search(&SourceType::Chunk, "payments", 0.0, 10)
            .await
            .unwrap();
        let result = results[0].clone().into_result();
        assert_eq!(result.source_label, "Curriculum (part 1)");
    }

    #[tokio::test]
    async fn keyword_search_reports_best_field() {
        let store = seeded().await;

        let content = store
            .keyword_search(&SourceType::Document, "postgres", 10)
            .await
            .unwrap();
        assert_eq!(content[0].field, MatchField::Content);

        let tag = store
            .keyword_search(&SourceType::Portfolio, "svelte", 10)
            .await
            .unwrap();
        assert_eq!(tag[0].field, MatchField::Tag);

        let title = store
            .keyword_search(&SourceType::Portfolio, "online", 10)
            .await
            .unwrap();
        assert_eq!(title[0].field, MatchField::Other);
    }

    #[tokio::test]
    async fn history_is_newest_first_per_session() {
        let store = InMemoryStore::new();
        for (session, msg) in [("a", "one"), ("b", "other"), ("a", "two"), ("a", "three")] {
            store
                .append_turn(ConversationTurn {
                    session_id: SessionId::from_string(session),
                    user_message: msg.into(),
                    bot_response: "ok".into(),
                    context_snapshot: vec![],
                    provider: "mock".into(),
                    tokens_used: 0,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let recent = store
            .recent_turns(&SessionId::from_string("a"), 2)
            .await
            .unwrap();
        let messages: Vec<&str> = recent.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(messages, vec!["three", "two"]);
        assert_eq!(store.turn_count().await, 4);
    }

    #[tokio::test]
    async fn inactive_templates_are_invisible() {
        let store = InMemoryStore::new();
        let mut hidden = PromptTemplate::new("old", "x");
        hidden.is_active = false;
        store.put_template(hidden).await.unwrap();
        store
            .put_template(PromptTemplate::new("rag_system", "y"))
            .await
            .unwrap();

        assert!(store.active_template("old").await.unwrap().is_none());
        assert!(store.active_template("rag_system").await.unwrap().is_some());
        assert_eq!(store.list_active_templates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn put_replaces_record_with_same_id() {
        let store = seeded().await;
        store
            .put_portfolio(NewPortfolioEntry {
                id: Some("shop".into()),
                title: "Shop v2".into(),
                description: "Rewritten".into(),
                technologies: vec![],
            })
            .await
            .unwrap();

        let hits = store
            .lexical_search(&SourceType::Portfolio, "rewritten", 0.0, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].clone().into_result().source_label, "Shop v2");

        let stale = store
            .lexical_search(&SourceType::Portfolio, "storefront", 0.0, 10)
            .await
            .unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn extra_source_groups_are_searchable() {
        let store = InMemoryStore::new();
        store
            .put_source(NewSource {
                id: Some("t1".into()),
                source_type: "talks".into(),
                label: "RustConf".into(),
                content: "Async runtimes in practice".into(),
            })
            .await
            .unwrap();
        let results = store
            .lexical_search(&SourceType::Other("talks".into()), "async", 0.0, 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        let err = store
            .put_source(NewSource {
                id: None,
                source_type: "portfolio".into(),
                label: "x".into(),
                content: "y".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedSource(_)));
    }
}
