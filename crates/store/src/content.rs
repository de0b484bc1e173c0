//! Writing site content into a store, and the JSON seed bundle format.

use async_trait::async_trait;
use folio_core::error::StoreError;
use folio_core::template::PromptTemplate;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A document (article, page, CV) to index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One fragment of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChunk {
    #[serde(default)]
    pub id: Option<String>,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
}

/// A portfolio/profile entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPortfolioEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// A record in a source group beyond the built-in three.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSource {
    #[serde(default)]
    pub id: Option<String>,
    pub source_type: String,
    pub label: String,
    pub content: String,
}

/// Write access to a store's content tables. Returns the stored id.
#[async_trait]
pub trait ContentWriter: Send + Sync {
    async fn put_document(&self, doc: NewDocument) -> Result<String, StoreError>;

    async fn put_chunk(&self, chunk: NewChunk) -> Result<String, StoreError>;

    async fn put_portfolio(&self, entry: NewPortfolioEntry) -> Result<String, StoreError>;

    async fn put_source(&self, source: NewSource) -> Result<String, StoreError>;

    /// Insert or replace a template by name.
    async fn put_template(&self, template: PromptTemplate) -> Result<(), StoreError>;
}

pub(crate) fn id_or_new(id: Option<String>) -> String {
    id.filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// A document in a seed file; its `chunks` become fragments in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDocument {
    #[serde(flatten)]
    pub document: NewDocument,
    #[serde(default)]
    pub chunks: Vec<String>,
}

/// The content of a seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedBundle {
    #[serde(default)]
    pub documents: Vec<SeedDocument>,
    #[serde(default)]
    pub portfolio: Vec<NewPortfolioEntry>,
    #[serde(default)]
    pub sources: Vec<NewSource>,
    #[serde(default)]
    pub templates: Vec<PromptTemplate>,
}

/// Counts of what a seed run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub documents: usize,
    pub chunks: usize,
    pub portfolio: usize,
    pub sources: usize,
    pub templates: usize,
}

impl SeedBundle {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::Storage(format!("Invalid seed file: {e}")))
    }

    /// Write every item of the bundle through `writer`.
    pub async fn apply(self, writer: &dyn ContentWriter) -> Result<SeedReport, StoreError> {
        let mut report = SeedReport::default();

        for seed in self.documents {
            let doc_id = writer.put_document(seed.document).await?;
            report.documents += 1;

            for (index, text) in seed.chunks.into_iter().enumerate() {
                writer
                    .put_chunk(NewChunk {
                        id: Some(format!("{doc_id}-{index}")),
                        document_id: doc_id.clone(),
                        chunk_index: index as u32,
                        text,
                    })
                    .await?;
                report.chunks += 1;
            }
        }

        for entry in self.portfolio {
            writer.put_portfolio(entry).await?;
            report.portfolio += 1;
        }

        for source in self.sources {
            writer.put_source(source).await?;
            report.sources += 1;
        }

        for template in self.templates {
            writer.put_template(template).await?;
            report.templates += 1;
        }

        info!(?report, "Seed applied");
        Ok(report)
    }
}
