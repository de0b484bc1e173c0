//! Conversation orchestrator: one chat turn, end to end.
//!
//! ```text
//! Received → Retrieving → Assembling → Composing → Generating → Persisting → Responded
//!     └──────────────┴────────────┴───────────┴────────────┴──→ Failed
//! ```
//!
//! Only three things end a turn early: an unusable message, a missing
//! template, and a failed completion. Retrieval and history problems
//! degrade to less context. Persistence and audit run on a detached task
//! after the answer is decided and can only fail into the logs.

use chrono::{DateTime, Utc};
use folio_config::AppConfig;
use folio_core::error::ProviderError;
use folio_core::history::{ConversationTurn, HistoryStore};
use folio_core::message::SessionId;
use folio_core::provider::{Provider, ProviderRequest, ProviderResponse};
use folio_core::source::{SourceProvenance, TextStore};
use folio_core::template::TemplateStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::assembler::{ContextAssembler, ContextBlock};
use crate::audit::{AuditEntry, AuditOutcome, AuditSink};
use crate::composer::{PromptComposer, TurnInputs};
use crate::error::PipelineError;
use crate::ranker::{RelevanceRanker, SearchOptions};
use crate::template_cache::TemplateCache;

/// Longest message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Received,
    Retrieving,
    Assembling,
    Composing,
    Generating,
    Persisting,
    Responded,
    Failed,
}

impl std::fmt::Display for TurnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::Composing => "composing",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
            Self::Responded => "responded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// An inbound chat message.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    /// Visitor display name for `{userName}`
    pub user_name: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// A successfully answered turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response_text: String,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub sources_used: Vec<SourceProvenance>,
    /// Results returned by the ranker, before the context budget
    pub results_count: usize,
    /// Lowest and highest score among the sources used
    pub relevance_range: Option<(f32, f32)>,
    pub provider: String,
    pub model: String,
    pub tokens_used: u32,
    pub processing_time: Duration,
}

/// Tunables of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub search: SearchOptions,
    pub max_context_tokens: usize,
    pub template_name: String,
    pub history_turns: usize,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub generation_timeout: Duration,
    pub history_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            search: SearchOptions::from_config(&config.retrieval),
            max_context_tokens: config.context.max_tokens,
            template_name: config.prompt.template.clone(),
            history_turns: config.prompt.history_turns,
            model: config.generation_model().to_string(),
            max_output_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            history_timeout: Duration::from_secs(config.generation.history_timeout_secs),
        }
    }
}

/// Drives a chat turn through retrieval, assembly, composition, generation
/// and persistence.
pub struct ConversationOrchestrator {
    ranker: RelevanceRanker,
    assembler: ContextAssembler,
    composer: PromptComposer,
    history: Arc<dyn HistoryStore>,
    templates: Arc<dyn TemplateStore>,
    provider: Arc<dyn Provider>,
    audit: Option<Arc<dyn AuditSink>>,
    settings: PipelineSettings,
}

impl ConversationOrchestrator {
    /// Create an orchestrator with default ranking, assembly and composition.
    pub fn new(
        text: Arc<dyn TextStore>,
        history: Arc<dyn HistoryStore>,
        templates: Arc<dyn TemplateStore>,
        provider: Arc<dyn Provider>,
        settings: PipelineSettings,
    ) -> Self {
        let composer = PromptComposer::new(provider.name());
        Self {
            ranker: RelevanceRanker::new(text),
            assembler: ContextAssembler::default(),
            composer,
            history,
            templates,
            provider,
            audit: None,
            settings,
        }
    }

    /// Create an orchestrator with every component configured from `config`.
    pub fn from_config(
        config: &AppConfig,
        text: Arc<dyn TextStore>,
        history: Arc<dyn HistoryStore>,
        templates: Arc<dyn TemplateStore>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        let composer = PromptComposer::from_config(&config.prompt, provider.name());
        Self {
            ranker: RelevanceRanker::from_config(text, &config.retrieval),
            assembler: ContextAssembler::from_config(&config.context),
            composer,
            history,
            templates,
            provider,
            audit: None,
            settings: PipelineSettings::from_config(config),
        }
    }

    /// Attach a sink that receives one diagnostic entry per turn.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Answer one chat message.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatOutcome, PipelineError> {
        let started = Instant::now();
        let mut stage = TurnStage::Received;

        let result = self.run(request, started, &mut stage).await;
        if let Err(e) = &result {
            warn!(
                failed_at = %stage,
                code = e.code(),
                error = %e,
                "Chat turn failed"
            );
            advance(&mut stage, TurnStage::Failed);
        }
        result
    }

    async fn run(
        &self,
        request: ChatRequest,
        started: Instant,
        stage: &mut TurnStage,
    ) -> Result<ChatOutcome, PipelineError> {
        let message = validate(&request.message)?;
        let session_id = SessionId::resolve(request.session_id.as_deref());
        debug!(session = %session_id, chars = message.chars().count(), "Turn received");

        advance(stage, TurnStage::Retrieving);
        let results = self.ranker.search(message, &self.settings.search).await;

        advance(stage, TurnStage::Assembling);
        let context = self
            .assembler
            .build(&results, self.settings.max_context_tokens);

        advance(stage, TurnStage::Composing);
        let history = self.recent_history(&session_id).await;
        let mut cache = TemplateCache::new(self.templates.as_ref());
        let template_name = self.settings.template_name.as_str();
        let template = match cache.active(template_name).await {
            Ok(Some(template)) => template,
            Ok(None) => return Err(PipelineError::TemplateMissing(template_name.to_string())),
            Err(e) => {
                warn!(template = template_name, error = %e, "Template lookup failed");
                return Err(PipelineError::TemplateMissing(template_name.to_string()));
            }
        };

        let prompt = self.composer.conversation_prompt(
            &template,
            &TurnInputs {
                context: &context.text,
                user_message: message,
                history: &history,
                session_id: &session_id,
                user_name: request.user_name.as_deref(),
            },
        );

        advance(stage, TurnStage::Generating);
        let generated = self.generate(&prompt).await;

        let response = match generated {
            Ok(response) => response,
            Err(e) => {
                self.spawn_audit(AuditEntry {
                    timestamp: Utc::now(),
                    session_id: session_id.to_string(),
                    user_message: message.to_string(),
                    sources: context.sources_used.clone(),
                    template: template.name.clone(),
                    active_templates: Vec::new(),
                    prompt,
                    outcome: AuditOutcome::Failed {
                        error: e.to_string(),
                    },
                    provider: self.provider.name().to_string(),
                    model: self.settings.model.clone(),
                    tokens_used: 0,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                });
                return Err(PipelineError::Generation(e));
            }
        };

        advance(stage, TurnStage::Persisting);
        let outcome = ChatOutcome {
            response_text: response.message.content.trim().to_string(),
            session_id: session_id.clone(),
            timestamp: Utc::now(),
            sources_used: context.sources_used.clone(),
            results_count: results.len(),
            relevance_range: context.relevance_range(),
            provider: self.provider.name().to_string(),
            model: response.model.clone(),
            tokens_used: response.tokens_used(),
            processing_time: started.elapsed(),
        };
        self.spawn_persist(
            &outcome,
            message,
            &context,
            &template.name,
            prompt,
            response.message.content,
        );

        advance(stage, TurnStage::Responded);
        info!(
            session = %outcome.session_id,
            results = outcome.results_count,
            sources = outcome.sources_used.len(),
            tokens = outcome.tokens_used,
            elapsed_ms = outcome.processing_time.as_millis() as u64,
            "Chat turn answered"
        );
        Ok(outcome)
    }

    /// Up to `history_turns` prior turns, oldest first. Unavailable history
    /// is treated as none.
    async fn recent_history(&self, session_id: &SessionId) -> Vec<ConversationTurn> {
        if self.settings.history_turns == 0 {
            return Vec::new();
        }

        let lookup = self
            .history
            .recent_turns(session_id, self.settings.history_turns);
        match tokio::time::timeout(self.settings.history_timeout, lookup).await {
            Ok(Ok(mut turns)) => {
                turns.truncate(self.settings.history_turns);
                turns.reverse();
                turns
            }
            Ok(Err(e)) => {
                warn!(session = %session_id, error = %e, "History unavailable, continuing without it");
                Vec::new()
            }
            Err(_) => {
                warn!(session = %session_id, "History lookup timed out, continuing without it");
                Vec::new()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let request = ProviderRequest::from_prompt(
            &self.settings.model,
            prompt,
            self.settings.max_output_tokens,
            self.settings.temperature,
        );

        let timeout = self.settings.generation_timeout;
        let response = tokio::time::timeout(timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "Completion did not return within {}s",
                    timeout.as_secs_f32()
                ))
            })??;

        if response.message.content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(response)
    }

    fn spawn_persist(
        &self,
        outcome: &ChatOutcome,
        message: &str,
        context: &ContextBlock,
        template: &str,
        prompt: String,
        raw_response: String,
    ) {
        let turn = ConversationTurn {
            session_id: outcome.session_id.clone(),
            user_message: message.to_string(),
            bot_response: outcome.response_text.clone(),
            context_snapshot: context.sources_used.clone(),
            provider: outcome.provider.clone(),
            tokens_used: outcome.tokens_used,
            created_at: outcome.timestamp,
        };

        let audit = self.audit.clone().map(|sink| {
            let entry = AuditEntry {
                timestamp: outcome.timestamp,
                session_id: outcome.session_id.to_string(),
                user_message: message.to_string(),
                sources: context.sources_used.clone(),
                template: template.to_string(),
                active_templates: Vec::new(),
                prompt,
                outcome: AuditOutcome::Answered {
                    response: raw_response,
                },
                provider: outcome.provider.clone(),
                model: outcome.model.clone(),
                tokens_used: outcome.tokens_used,
                processing_time_ms: outcome.processing_time.as_millis() as u64,
            };
            (sink, entry)
        });

        let history = Arc::clone(&self.history);
        let templates = Arc::clone(&self.templates);
        tokio::spawn(async move {
            let session = turn.session_id.clone();
            if let Err(e) = history.append_turn(turn).await {
                warn!(session = %session, error = %e, "Failed to persist conversation turn");
            }

            if let Some((sink, entry)) = audit {
                write_audit(sink.as_ref(), templates.as_ref(), entry).await;
            }
        });
    }

    fn spawn_audit(&self, entry: AuditEntry) {
        let Some(sink) = self.audit.clone() else {
            return;
        };
        let templates = Arc::clone(&self.templates);
        tokio::spawn(async move {
            write_audit(sink.as_ref(), templates.as_ref(), entry).await;
        });
    }
}

async fn write_audit(sink: &dyn AuditSink, templates: &dyn TemplateStore, mut entry: AuditEntry) {
    // Audit detail only: a failed listing leaves the field empty.
    if let Ok(active) = templates.list_active_templates().await {
        entry.active_templates = active.into_iter().map(|t| t.name).collect();
    }
    if let Err(e) = sink.record(&entry) {
        warn!(session = %entry.session_id, error = %e, "Failed to write audit entry");
    }
}

fn validate(message: &str) -> Result<&str, PipelineError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(PipelineError::Validation("Message must not be empty".into()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(PipelineError::Validation(format!(
            "Message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(message)
}

fn advance(stage: &mut TurnStage, next: TurnStage) {
    debug!(from = %stage, to = %next, "Turn stage");
    *stage = next;
}
