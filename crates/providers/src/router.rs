//! Provider router: builds completion backends from config and picks the
//! one that answers chat turns.

use crate::anthropic::AnthropicProvider;
use crate::fallback::FallbackProvider;
use crate::openai_compat::OpenAiCompatProvider;
use folio_config::{AppConfig, ProviderConfig};
use folio_core::error::ProviderError;
use folio_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Registry of named providers with a designated default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The default provider, if registered.
    pub fn primary(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn build_provider(
    name: &str,
    provider_config: Option<&ProviderConfig>,
    fallback_key: Option<&String>,
) -> Arc<dyn Provider> {
    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| fallback_key.cloned())
        .unwrap_or_default();

    let custom_url = provider_config.and_then(|p| p.api_url.clone());

    if name == "anthropic" {
        let mut p = AnthropicProvider::new(&api_key);
        if let Some(url) = custom_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = custom_url.unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key))
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        router.register(
            name.clone(),
            build_provider(name, Some(provider_config), config.api_key.as_ref()),
        );
    }

    // The default provider exists even when not explicitly configured
    if router.get(&config.default_provider).is_none() {
        router.register(
            config.default_provider.clone(),
            build_provider(&config.default_provider, None, config.api_key.as_ref()),
        );
    }

    for name in &config.fallback_providers {
        if router.get(name).is_none() {
            router.register(
                name.clone(),
                build_provider(name, None, config.api_key.as_ref()),
            );
        }
    }

    router
}

/// The provider that answers chat turns: the default provider alone, or a
/// fallback chain when `fallback_providers` is configured.
pub fn answer_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let router = build_from_config(config);
    let primary = router.primary().ok_or_else(|| {
        ProviderError::NotConfigured(format!("provider '{}'", config.default_provider))
    })?;

    if config.fallback_providers.is_empty() {
        return Ok(primary);
    }

    let entry_timeout = |name: &str| {
        config
            .providers
            .get(name)
            .and_then(|p| p.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(crate::fallback::DEFAULT_ENTRY_TIMEOUT)
    };

    let mut chain = FallbackProvider::new(config.default_provider.clone())
        .add(primary, entry_timeout(&config.default_provider));

    for name in &config.fallback_providers {
        if let Some(provider) = router.get(name) {
            chain = chain.add(provider, entry_timeout(name));
        }
    }

    Ok(Arc::new(chain))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "anthropic" => "https://api.anthropic.com".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
