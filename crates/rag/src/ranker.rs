//! Relevance ranking across source groups.
//!
//! # Algorithm
//!
//! 1. Query every enabled source group concurrently, each under its own
//!    timeout. A group that errors or times out contributes nothing.
//! 2. Normalize each record into a [`SearchResult`] and multiply its score
//!    by the boost configured for its source type.
//! 3. Keep results whose boosted score still exceeds `min_relevance`.
//! 4. Sort by boosted score (descending), drop duplicates by identity and
//!    by content hash keeping the first occurrence, truncate to `limit`.
//!
//! If no group yields anything, fall back to per-keyword substring matching
//! scored by which field matched.

use folio_config::{BoostConfig, RetrievalConfig};
use folio_core::error::StoreError;
use folio_core::source::{KeywordMatch, MatchField, SearchResult, SourceRecord, SourceType, TextStore};
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::keywords;

/// Scores assigned to keyword fallback hits by matched field.
pub const CONTENT_MATCH_SCORE: f32 = 0.9;
pub const TAG_MATCH_SCORE: f32 = 0.7;
pub const OTHER_MATCH_SCORE: f32 = 0.5;

/// Per-call search parameters.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_relevance: f32,
    pub source_groups: Vec<SourceType>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 8,
            min_relevance: 0.3,
            source_groups: SourceType::builtin(),
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            limit: config.limit,
            min_relevance: config.min_relevance,
            source_groups: config.source_groups.clone(),
        }
    }
}

/// Merges lexical results from several source groups into one ranked list.
pub struct RelevanceRanker {
    store: Arc<dyn TextStore>,
    boosts: BoostConfig,
    fallback_enabled: bool,
    language: String,
    group_timeout: Duration,
}

impl RelevanceRanker {
    pub fn new(store: Arc<dyn TextStore>) -> Self {
        Self {
            store,
            boosts: BoostConfig::default(),
            fallback_enabled: true,
            language: "es".into(),
            group_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(store: Arc<dyn TextStore>, config: &RetrievalConfig) -> Self {
        Self::new(store)
            .with_boosts(config.boosts.clone())
            .with_fallback(config.fallback_enabled)
            .with_language(config.stop_word_language.clone())
            .with_group_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_boosts(mut self, boosts: BoostConfig) -> Self {
        self.boosts = boosts;
        self
    }

    /// Enable or disable the keyword fallback.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Language of the stop-word list used by the keyword fallback.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Timeout applied to each source-group query.
    pub fn with_group_timeout(mut self, timeout: Duration) -> Self {
        self.group_timeout = timeout;
        self
    }

    /// Rank the content most relevant to `query`. Never fails: store errors
    /// degrade to fewer (or zero) results.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() || options.limit == 0 {
            return Vec::new();
        }

        let lookups = options
            .source_groups
            .iter()
            .map(|group| self.lexical_group(group, query, options));
        let candidates: Vec<SearchResult> = join_all(lookups).await.into_iter().flatten().collect();

        let raw_count = candidates.len();
        let boosted: Vec<SearchResult> = candidates
            .into_iter()
            .map(|r| self.boost(r))
            .filter(|r| r.relevance_score > options.min_relevance)
            .collect();

        if raw_count > 0 {
            let ranked = rank(boosted, options.limit);
            debug!(
                candidates = raw_count,
                returned = ranked.len(),
                "Lexical retrieval complete"
            );
            return ranked;
        }

        if !self.fallback_enabled {
            return Vec::new();
        }

        let ranked = self.keyword_fallback(query, options).await;
        info!(
            returned = ranked.len(),
            "Lexical retrieval empty, used keyword fallback"
        );
        ranked
    }

    async fn lexical_group(
        &self,
        group: &SourceType,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<SearchResult> {
        let lookup = self
            .store
            .lexical_search(group, query, options.min_relevance, options.limit);

        match self.bounded(group, lookup).await {
            Some(records) => records.into_iter().map(SourceRecord::into_result).collect(),
            None => Vec::new(),
        }
    }

    async fn keyword_fallback(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let terms = keywords::extract(query, &self.language);
        if terms.is_empty() {
            return Vec::new();
        }

        let lookups = options.source_groups.iter().flat_map(|group| {
            terms.iter().map(move |term| async move {
                let lookup = self.store.keyword_search(group, term, options.limit);
                self.bounded(group, lookup).await.unwrap_or_default()
            })
        });

        let hits: Vec<SearchResult> = join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .map(tiered_result)
            .collect();

        rank(hits, options.limit)
    }

    /// Run one store call under the group timeout; failures are logged and
    /// reported as `None`.
    async fn bounded<T>(
        &self,
        group: &SourceType,
        lookup: impl Future<Output = Result<T, StoreError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.group_timeout, lookup).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(group = %group, store = self.store.name(), error = %e, "Source group search failed");
                None
            }
            Err(_) => {
                warn!(
                    group = %group,
                    timeout_ms = self.group_timeout.as_millis() as u64,
                    "Source group search timed out"
                );
                None
            }
        }
    }

    fn boost(&self, mut result: SearchResult) -> SearchResult {
        result.relevance_score *= self.boosts.factor(&result.source_type);
        result
    }
}

fn tiered_result(hit: KeywordMatch) -> SearchResult {
    let score = match hit.field {
        MatchField::Content => CONTENT_MATCH_SCORE,
        MatchField::Tag => TAG_MATCH_SCORE,
        MatchField::Other => OTHER_MATCH_SCORE,
    };
    hit.record.with_score(score).into_result()
}

/// Sort descending, drop duplicates keeping the best-scored entry, truncate.
fn rank(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.source_type.as_str().cmp(b.source_type.as_str()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut identities = HashSet::new();
    let mut hashes = HashSet::new();
    results.retain(|r| {
        let identity = r.identity_key();
        let hash = content_hash(&r.content_text);
        if identities.contains(&identity) || hashes.contains(&hash) {
            return false;
        }
        identities.insert(identity);
        hashes.insert(hash);
        true
    });

    results.truncate(limit);
    results
}

fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.trim().as_bytes()))
}
