//! Failures that end a chat turn.
//!
//! Everything else (a source group that cannot be searched, history that
//! cannot be read, a turn that cannot be persisted) degrades and is logged.

use folio_core::error::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request itself is unusable.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The configured system template does not exist or is inactive.
    #[error("Prompt template '{0}' is missing or inactive")]
    TemplateMissing(String),

    /// The completion call failed, timed out, or came back unusable.
    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),
}

impl PipelineError {
    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TemplateMissing(_) => "CONFIGURATION_ERROR",
            Self::Generation(ProviderError::Timeout(_)) => "GENERATION_TIMEOUT",
            Self::Generation(_) => "GENERATION_ERROR",
        }
    }

    /// Message safe to show a visitor. Provider and configuration detail
    /// stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(reason) => reason.clone(),
            Self::TemplateMissing(_) => "The assistant is not configured correctly.".into(),
            Self::Generation(_) => {
                "The assistant could not produce an answer right now. Please try again.".into()
            }
        }
    }
}
