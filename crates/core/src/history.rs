//! Conversation history: append-only record of completed exchanges.
//!
//! Turns are written exclusively by the orchestrator once a response has
//! been generated, and read back (newest first) to give the model a short
//! window of what was said earlier in the same session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;
use crate::message::SessionId;
use crate::source::SourceProvenance;

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Correlation key of the conversation
    pub session_id: SessionId,

    /// What the visitor asked
    pub user_message: String,

    /// What the model answered
    pub bot_response: String,

    /// Sources that fed the context for this answer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_snapshot: Vec<SourceProvenance>,

    /// Provider that generated the answer
    pub provider: String,

    /// Tokens reported by the provider
    #[serde(default)]
    pub tokens_used: u32,

    /// When this turn was recorded
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Short, human-readable summary of the context snapshot.
    pub fn snapshot_summary(&self) -> String {
        self.context_snapshot
            .iter()
            .map(|s| format!("{}:{} ({:.2})", s.source_type, s.id, s.relevance_score))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The conversation-history collaborator.
///
/// Must support concurrent reads and appends.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a completed turn. Turns are never mutated afterwards.
    async fn append_turn(&self, turn: ConversationTurn) -> std::result::Result<(), StoreError>;

    /// Up to `limit` turns of `session_id`, newest first.
    async fn recent_turns(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> std::result::Result<Vec<ConversationTurn>, StoreError>;
}
