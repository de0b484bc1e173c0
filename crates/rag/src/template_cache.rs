//! Per-request template cache.
//!
//! Created at the start of a turn and dropped with it, so an edited or
//! deactivated template takes effect on the very next request.

use folio_core::error::StoreError;
use folio_core::template::{PromptTemplate, TemplateStore};
use std::collections::HashMap;

pub struct TemplateCache<'a> {
    store: &'a dyn TemplateStore,
    resolved: HashMap<String, Option<PromptTemplate>>,
}

impl<'a> TemplateCache<'a> {
    pub fn new(store: &'a dyn TemplateStore) -> Self {
        Self {
            store,
            resolved: HashMap::new(),
        }
    }

    /// The active template called `name`. Each name hits the store at most
    /// once per cache, including lookups that found nothing.
    pub async fn active(&mut self, name: &str) -> Result<Option<PromptTemplate>, StoreError> {
        if let Some(cached) = self.resolved.get(name) {
            return Ok(cached.clone());
        }

        let template = self.store.active_template(name).await?;
        self.resolved.insert(name.to_string(), template.clone());
        Ok(template)
    }
}
