//! Storage backends for Folio: site content, conversation history and
//! prompt templates.
//!
//! Each backend implements every collaborator trait from `folio_core`
//! plus [`ContentWriter`], so one handle serves the whole pipeline.

pub mod content;
pub mod in_memory;
mod scoring;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use content::{
    ContentWriter, NewChunk, NewDocument, NewPortfolioEntry, NewSource, SeedBundle, SeedReport,
};
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use folio_config::StoreConfig;
use folio_core::error::StoreError;
use folio_core::{HistoryStore, TemplateStore, TextStore};
use std::sync::Arc;

/// A store serving text search, history, templates and content writes.
pub trait Backend: TextStore + HistoryStore + TemplateStore + ContentWriter {}

impl<T: TextStore + HistoryStore + TemplateStore + ContentWriter> Backend for T {}

/// Open the backend named in `[store]`.
pub async fn open_backend(config: &StoreConfig) -> Result<Arc<dyn Backend>, StoreError> {
    match config.backend.as_str() {
        "memory" | "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteStore::new(&config.path).await?)),
        other => Err(StoreError::Storage(format!("Unknown store backend '{other}'"))),
    }
}
