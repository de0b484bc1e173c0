//! Shared doubles for pipeline tests.

use async_trait::async_trait;
use folio_core::error::{ProviderError, StoreError};
use folio_core::history::{ConversationTurn, HistoryStore};
use folio_core::message::{Message, SessionId};
use folio_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use folio_core::source::{KeywordMatch, SourceRecord, SourceType, TextStore};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

pub fn document(id: &str, title: &str, content: &str, score: f32) -> SourceRecord {
    SourceRecord::Document {
        id: id.into(),
        title: title.into(),
        content: content.into(),
        tags: vec![],
        score,
    }
}

pub fn fragment(id: &str, title: &str, chunk_index: u32, text: &str, score: f32) -> SourceRecord {
    SourceRecord::Fragment {
        id: id.into(),
        document_id: title.to_lowercase(),
        document_title: title.into(),
        chunk_index,
        text: text.into(),
        score,
    }
}

pub fn portfolio(id: &str, title: &str, description: &str, score: f32) -> SourceRecord {
    SourceRecord::Portfolio {
        id: id.into(),
        title: title.into(),
        description: description.into(),
        technologies: vec![],
        score,
    }
}

/// A text store that answers every query with fixed records per group.
#[derive(Default)]
pub struct ScriptedStore {
    records: HashMap<SourceType, Vec<SourceRecord>>,
    keyword_hits: HashMap<SourceType, Vec<KeywordMatch>>,
    failing: HashSet<SourceType>,
    hanging: HashSet<SourceType>,
    lexical_calls: Mutex<usize>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, group: SourceType, records: Vec<SourceRecord>) -> Self {
        self.records.insert(group, records);
        self
    }

    pub fn with_keyword_hits(mut self, group: SourceType, hits: Vec<KeywordMatch>) -> Self {
        self.keyword_hits.insert(group, hits);
        self
    }

    /// Every query against `group` fails.
    pub fn failing(mut self, group: SourceType) -> Self {
        self.failing.insert(group);
        self
    }

    /// Every query against `group` never completes.
    pub fn hanging(mut self, group: SourceType) -> Self {
        self.hanging.insert(group);
        self
    }

    #[allow(dead_code)]
    pub fn lexical_calls(&self) -> usize {
        *self.lexical_calls.lock().unwrap()
    }

    async fn gate(&self, group: &SourceType) -> Result<(), StoreError> {
        if self.hanging.contains(group) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.contains(group) {
            return Err(StoreError::QueryFailed(format!("no such table: {group}")));
        }
        Ok(())
    }
}

#[async_trait]
impl TextStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn lexical_search(
        &self,
        group: &SourceType,
        _query: &str,
        min_score: f32,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        *self.lexical_calls.lock().unwrap() += 1;
        self.gate(group).await?;
        Ok(self
            .records
            .get(group)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.score() > min_score)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn keyword_search(
        &self,
        group: &SourceType,
        _keyword: &str,
        limit: usize,
    ) -> Result<Vec<KeywordMatch>, StoreError> {
        self.gate(group).await?;
        Ok(self
            .keyword_hits
            .get(group)
            .map(|hits| hits.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers `text` on every one of `times` calls.
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(make_text_response(text))).collect())
    }

    pub fn single_text(text: &str) -> Self {
        Self::repeating(text, 1)
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The prompt of the n-th call.
    pub fn prompt(&self, call: usize) -> String {
        self.requests.lock().unwrap()[call].messages[0].content.clone()
    }

    pub fn request(&self, call: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        let call = requests.len();
        if call >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                call,
                responses.len()
            );
        }

        requests.push(request);
        responses[call].clone()
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 120,
            completion_tokens: 30,
            total_tokens: 150,
        }),
        model: "mock-fast".into(),
    }
}

/// A provider whose completion never returns.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        Err(ProviderError::EmptyResponse)
    }
}

/// A history store that is always unavailable.
pub struct FailingHistory;

#[async_trait]
impl HistoryStore for FailingHistory {
    async fn append_turn(&self, _turn: ConversationTurn) -> Result<(), StoreError> {
        Err(StoreError::Storage("database is locked".into()))
    }

    async fn recent_turns(
        &self,
        _session_id: &SessionId,
        _limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        Err(StoreError::Storage("database is locked".into()))
    }
}
