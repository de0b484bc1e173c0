//! Provider fallback: an ordered chain of completion backends.
//!
//! The answer model is a fast tier that can be rate limited or briefly
//! unavailable. When the primary backend fails or exceeds its own timeout,
//! the next backend in the chain gets the same request.

use async_trait::async_trait;
use folio_core::error::ProviderError;
use folio_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-backend timeout used when none is configured.
pub const DEFAULT_ENTRY_TIMEOUT: Duration = Duration::from_secs(30);

/// A provider that wraps an ordered list of providers and falls back on failure.
pub struct FallbackProvider {
    name: String,
    chain: Vec<FallbackEntry>,
}

struct FallbackEntry {
    provider: Arc<dyn folio_core::Provider>,
    timeout: Duration,
}

impl FallbackProvider {
    /// Create a new fallback provider with no entries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Add a provider to the chain with its own timeout.
    pub fn add(mut self, provider: Arc<dyn folio_core::Provider>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { provider, timeout });
        self
    }
}

#[async_trait]
impl folio_core::Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No providers in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name();

            info!(
                provider = %provider_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying provider"
            );

            match tokio::time::timeout(entry.timeout, entry.provider.complete(request.clone()))
                .await
            {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => {
                    warn!(
                        provider = %provider_name,
                        error = %e,
                        "Fallback: provider failed, trying next"
                    );
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        provider = %provider_name,
                        timeout_ms = entry.timeout.as_millis() as u64,
                        "Fallback: provider timed out, trying next"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}ms",
                        provider_name,
                        entry.timeout.as_millis()
                    ));
                }
            }
        }

        Err(last_error)
    }
}
