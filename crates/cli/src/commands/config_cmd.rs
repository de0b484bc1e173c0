//! `folio config`: inspect and validate configuration.

use folio_config::AppConfig;
use std::path::Path;

pub fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;

    // Never print secrets
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }

    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", super::config_path(config_path).display());
}

pub fn validate(config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = super::config_path(config_path);
    println!("🔍 Validating {}", path.display());

    if !path.exists() {
        println!("   File not found; built-in defaults apply");
    }

    let config = super::load_config(config_path)?;
    println!("   ✅ Configuration is valid");
    println!("   Provider:   {} ({})", config.default_provider, config.generation_model());
    if !config.fallback_providers.is_empty() {
        println!("   Fallbacks:  {}", config.fallback_providers.join(", "));
    }
    println!("   Template:   {}", config.prompt.template);
    println!(
        "   Retrieval:  limit {}, min relevance {}",
        config.retrieval.limit, config.retrieval.min_relevance
    );
    println!("   Context:    {} tokens", config.context.max_tokens);
    println!("   Store:      {} ({})", config.store.backend, config.store.path);
    if !config.has_api_key() {
        println!("   ⚠️  No API key set (FOLIO_API_KEY or api_key in config)");
    }
    Ok(())
}

pub fn init() {
    print!("{}", AppConfig::default_toml());
}
