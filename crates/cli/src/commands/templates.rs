//! `folio templates`: list the active prompt templates.

use folio_core::TemplateStore;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let backend = folio_store::open_backend(&config.store).await?;
    let templates = backend.list_active_templates().await?;

    if templates.is_empty() {
        println!("No active templates. Seed one named '{}' first.", config.prompt.template);
        return Ok(());
    }

    println!("📝 Active templates ({})", templates.len());
    for t in &templates {
        let marker = if t.name == config.prompt.template { "*" } else { " " };
        println!(
            " {marker} {:<24} v{:<3} priority {:<3} {}",
            t.name, t.version, t.priority, t.category
        );
    }
    if !templates.iter().any(|t| t.name == config.prompt.template) {
        println!();
        println!(
            "⚠️  The configured template '{}' is not active; chat requests will fail.",
            config.prompt.template
        );
    }
    Ok(())
}
