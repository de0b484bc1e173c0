//! `folio ask`: answer one question from the terminal.

use folio_core::HistoryStore;
use folio_core::message::SessionId;
use folio_gateway::api::ChatData;
use folio_rag::ChatRequest;
use std::path::Path;
use std::time::Duration;

/// How long to wait for the detached persistence task before exiting.
const PERSIST_WAIT: Duration = Duration::from_secs(2);

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    session: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let (backend, orchestrator) = folio_gateway::build_orchestrator(&config).await?;

    let mut request = ChatRequest::new(message);
    if let Some(id) = session {
        request = request.with_session(id);
    }

    let outcome = orchestrator.handle(request).await?;
    wait_for_turn(backend.as_ref(), &outcome.session_id, outcome.timestamp).await;

    if json {
        let data = ChatData::from(outcome);
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{}", outcome.response_text);
    println!();
    println!(
        "── session {} · {} sources · {}/{} · {} tokens · {:.2}s",
        outcome.session_id,
        outcome.sources_used.len(),
        outcome.provider,
        outcome.model,
        outcome.tokens_used,
        outcome.processing_time.as_secs_f64()
    );
    for source in &outcome.sources_used {
        println!(
            "   {:<10} {:.3}  {}",
            source.source_type.to_string(),
            source.relevance_score,
            source.id
        );
    }
    Ok(())
}

/// The turn is stored on a detached task; give it a chance to land so a
/// follow-up `--session` call sees it.
async fn wait_for_turn(
    history: &dyn HistoryStore,
    session_id: &SessionId,
    answered_at: chrono::DateTime<chrono::Utc>,
) {
    let deadline = tokio::time::Instant::now() + PERSIST_WAIT;
    while tokio::time::Instant::now() < deadline {
        if let Ok(turns) = history.recent_turns(session_id, 1).await
            && turns.first().is_some_and(|t| t.created_at >= answered_at)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tracing::warn!(session_id = %session_id, "Turn was not persisted before exit");
}
