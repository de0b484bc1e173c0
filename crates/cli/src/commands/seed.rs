//! `folio seed`: load site content and prompt templates from JSON.

use anyhow::Context;
use folio_core::TextStore;
use folio_store::SeedBundle;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, file: &Path) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    if config.store.backend != "sqlite" {
        tracing::warn!(
            backend = %config.store.backend,
            "Seeding a non-persistent store; the content is lost when this command exits"
        );
    }

    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Could not read seed file {}", file.display()))?;
    let bundle = SeedBundle::from_json(&json)?;

    let backend = folio_store::open_backend(&config.store).await?;
    let report = bundle.apply(backend.as_ref()).await?;

    println!("🌱 Seeded {} from {}", backend.name(), file.display());
    println!("   Documents: {} ({} fragments)", report.documents, report.chunks);
    println!("   Portfolio: {}", report.portfolio);
    println!("   Sources:   {}", report.sources);
    println!("   Templates: {}", report.templates);
    Ok(())
}
