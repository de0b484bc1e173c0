//! # Folio Core
//!
//! Domain types, collaborator traits, and error definitions for the Folio
//! retrieval-augmented question answering pipeline.
//! This crate has **zero framework dependencies**: it defines the domain
//! model that the store, provider, and pipeline crates implement against.
//!
//! ## Collaborators
//!
//! The pipeline talks to four external systems, each defined as a trait here:
//! - [`TextStore`]: lexical search over documents, fragments and portfolio entries
//! - [`HistoryStore`]: append-only conversation turns
//! - [`TemplateStore`]: named, versioned prompt templates
//! - [`Provider`]: the black-box text-completion API

pub mod error;
pub mod history;
pub mod keywords;
pub mod message;
pub mod provider;
pub mod source;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, StoreError};
pub use history::{ConversationTurn, HistoryStore};
pub use message::{Message, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use source::{
    KeywordMatch, MatchField, SearchResult, SourceProvenance, SourceRecord, SourceType, TextStore,
};
pub use template::{PromptTemplate, TemplateStore};
