//! Prompt templates: named, versioned instructions for the model.
//!
//! Templates are authored and deactivated elsewhere; the pipeline only
//! reads them, once per request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// A named, versioned prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Unique key
    pub name: String,

    /// Instructions, with `{placeholder}` tokens
    pub system_text: String,

    /// Text injected before the instructions (empty = none)
    #[serde(default)]
    pub context_preamble: String,

    /// Inactive templates are invisible to the pipeline
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Higher priority wins when several templates could apply
    #[serde(default)]
    pub priority: i32,

    /// Free-form grouping (e.g. "system", "persona")
    #[serde(default)]
    pub category: String,

    /// Monotonic revision number
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

impl PromptTemplate {
    /// An active, version-1 template with no preamble.
    pub fn new(name: impl Into<String>, system_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_text: system_text.into(),
            context_preamble: String::new(),
            is_active: true,
            priority: 0,
            category: "system".into(),
            version: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.context_preamble = preamble.into();
        self
    }
}

/// The prompt-template collaborator.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// The active template called `name`, if any.
    async fn active_template(&self, name: &str)
        -> std::result::Result<Option<PromptTemplate>, StoreError>;

    /// Every active template, highest priority first.
    async fn list_active_templates(&self) -> std::result::Result<Vec<PromptTemplate>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_template_is_active_without_preamble() {
        let t = PromptTemplate::new("rag_system", "Answer: {userMessage}");
        assert!(t.is_active);
        assert!(t.context_preamble.is_empty());
        assert_eq!(t.version, 1);
    }

    #[test]
    fn template_deserializes_with_defaults() {
        let json = r#"{"name":"persona","system_text":"You are {userName}'s guide"}"#;
        let t: PromptTemplate = serde_json::from_str(json).unwrap();
        assert!(t.is_active);
        assert_eq!(t.priority, 0);
        assert_eq!(t.version, 1);
    }
}
