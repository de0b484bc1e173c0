//! `folio serve`: run the chat endpoint.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }

    if !config.has_api_key() && config.default_provider != "ollama" {
        tracing::warn!("No API key configured; generation requests will fail");
    }

    println!("📁 Folio gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {}", config.default_provider);
    println!("   Model:     {}", config.generation_model());
    println!("   Store:     {}", config.store.backend);
    println!();
    println!("   POST /v1/chat   Ask a question");
    println!("   GET  /health    Health check");
    println!();

    folio_gateway::start(config).await?;
    Ok(())
}
