//! The Folio question-answering pipeline.
//!
//! A chat turn flows through four components:
//!
//! 1. **[`RelevanceRanker`]**: lexical search per source group, boosted and
//!    merged into one deduplicated ranking (keyword fallback when empty)
//! 2. **[`ContextAssembler`]**: ranked results into a labeled context block
//!    under a token budget
//! 3. **[`PromptComposer`]**: the active template with `{placeholder}`
//!    values filled in, including recent conversation history
//! 4. **[`ConversationOrchestrator`]**: drives the turn, calls the
//!    completion provider, and persists the exchange off the response path

pub mod assembler;
pub mod audit;
pub mod composer;
pub mod error;
pub use folio_core::keywords;
pub mod orchestrator;
pub mod ranker;
pub mod template_cache;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assembler::{ContextAssembler, ContextBlock, NO_INFORMATION};
pub use audit::{AuditEntry, AuditOutcome, AuditSink, JsonlFileSink, MemoryAuditSink};
pub use composer::{PromptComposer, PromptVariables, TurnInputs};
pub use error::PipelineError;
pub use orchestrator::{
    ChatOutcome, ChatRequest, ConversationOrchestrator, PipelineSettings, TurnStage,
};
pub use ranker::{RelevanceRanker, SearchOptions};
pub use template_cache::TemplateCache;
