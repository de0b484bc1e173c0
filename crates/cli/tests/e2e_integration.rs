//! End-to-end tests for the Folio pipeline.
//!
//! These exercise a seeded store through ranking, context assembly, prompt
//! composition and generation, both directly and over the HTTP gateway,
//! plus the `folio` binary against a real SQLite file.

use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use folio_config::{AppConfig, GatewayConfig};
use folio_core::error::ProviderError;
use folio_core::message::Message;
use folio_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use folio_core::source::SourceType;
use folio_gateway::api::ChatEnvelope;
use folio_gateway::{GatewayState, build_router};
use folio_rag::{
    AuditOutcome, AuditSink, ChatRequest, ConversationOrchestrator, MemoryAuditSink,
    NO_INFORMATION, PipelineError,
};
use folio_store::{InMemoryStore, SeedBundle};
use http_body_util::BodyExt;
use tower::ServiceExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A provider that answers from a script and records every prompt.
struct ScriptedProvider {
    answers: Vec<Result<String, ProviderError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(answers: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            answers,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn text(answer: &str) -> Self {
        Self::new(vec![Ok(answer.to_string())])
    }

    fn failing() -> Self {
        Self::new(vec![Err(ProviderError::Network("connection refused".into()))])
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let mut prompts = self.prompts.lock().unwrap();
        let call = prompts.len();
        prompts.push(prompt);

        // The last scripted answer repeats once the script runs out
        let answer = self
            .answers
            .get(call)
            .or_else(|| self.answers.last())
            .expect("script must not be empty");
        match answer {
            Ok(text) => Ok(ProviderResponse {
                message: Message::assistant(text.clone()),
                usage: Some(Usage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                    total_tokens: 120,
                }),
                model: "mock-fast".into(),
            }),
            Err(e) => Err(e.clone()),
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const SEED: &str = r#"{
    "documents": [
        {
            "id": "cv",
            "title": "Curriculum",
            "content": "Senior backend engineer writing Rust and Postgres services",
            "tags": ["backend"],
            "chunks": ["Built a payments API in Rust", "Hobbies: climbing"]
        }
    ],
    "portfolio": [
        {
            "id": "shop",
            "title": "Online shop",
            "description": "E-commerce platform built with Rust and Axum",
            "technologies": ["rust", "axum"]
        }
    ],
    "templates": [
        {
            "name": "rag_system",
            "system_text": "Context:\n{context}\n\nHistory:\n{conversationHistory}\n\nQuestion: {userMessage}"
        }
    ]
}"#;

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let report = SeedBundle::from_json(SEED)
        .unwrap()
        .apply(store.as_ref())
        .await
        .unwrap();
    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.portfolio, 1);
    assert_eq!(report.templates, 1);
    store
}

fn orchestrator(store: Arc<InMemoryStore>, provider: Arc<ScriptedProvider>) -> ConversationOrchestrator {
    ConversationOrchestrator::from_config(
        &AppConfig::default(),
        store.clone(),
        store.clone(),
        store,
        provider,
    )
}

/// Persistence runs detached; poll until `n` turns are stored.
async fn wait_for_turns(store: &InMemoryStore, n: usize) {
    for _ in 0..100 {
        if store.turn_count().await >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} stored turns, found {}", store.turn_count().await);
}

// ── Pipeline ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_answers_from_ranked_site_content() {
    let store = seeded_store().await;
    let provider = Arc::new(ScriptedProvider::text("I built an online shop in Rust."));
    let orchestrator = orchestrator(store.clone(), provider.clone());

    let outcome = orchestrator
        .handle(ChatRequest::new("rust axum shop"))
        .await
        .unwrap();

    assert_eq!(outcome.response_text, "I built an online shop in Rust.");
    assert_eq!(outcome.provider, "e2e_mock");
    assert_eq!(outcome.tokens_used, 120);

    // Portfolio matches every term and carries the largest boost
    assert_eq!(outcome.results_count, 3);
    assert_eq!(outcome.sources_used[0].source_type, SourceType::Portfolio);
    assert_eq!(outcome.sources_used[0].id, "shop");
    let scores: Vec<f32> = outcome.sources_used.iter().map(|s| s.relevance_score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "not ranked: {scores:?}");

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[Portfolio: Online shop]"));
    assert!(prompts[0].contains("[Document: Curriculum]"));
    assert!(prompts[0].contains("Question: rust axum shop"));
    assert!(!prompts[0].contains("Hobbies"));

    wait_for_turns(&store, 1).await;
}

#[tokio::test]
async fn e2e_follow_up_sees_previous_turn() {
    let store = seeded_store().await;
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok("The shop uses Axum.".into()),
        Ok("It also uses Postgres.".into()),
    ]));
    let orchestrator = orchestrator(store.clone(), provider.clone());

    let first = orchestrator
        .handle(ChatRequest::new("rust axum shop"))
        .await
        .unwrap();
    wait_for_turns(&store, 1).await;

    let second = orchestrator
        .handle(ChatRequest::new("postgres").with_session(first.session_id.to_string()))
        .await
        .unwrap();

    assert_eq!(second.session_id, first.session_id);
    let prompts = provider.prompts();
    assert!(prompts[1].contains("User: rust axum shop\nAssistant: The shop uses Axum."));

    wait_for_turns(&store, 2).await;
}

#[tokio::test]
async fn e2e_unknown_topic_still_answers_without_context() {
    let store = seeded_store().await;
    let provider = Arc::new(ScriptedProvider::text("I don't have information about that."));
    let orchestrator = orchestrator(store, provider.clone());

    let outcome = orchestrator
        .handle(ChatRequest::new("quantum chromodynamics"))
        .await
        .unwrap();

    assert_eq!(outcome.results_count, 0);
    assert!(outcome.sources_used.is_empty());
    assert!(outcome.relevance_range.is_none());
    assert!(provider.prompts()[0].contains(NO_INFORMATION));
}

#[tokio::test]
async fn e2e_missing_template_fails_before_generation() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(ScriptedProvider::text("unused"));
    let orchestrator = orchestrator(store, provider.clone());

    let err = orchestrator
        .handle(ChatRequest::new("rust"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::TemplateMissing(_)));
    assert!(provider.prompts().is_empty());
}

#[tokio::test]
async fn e2e_audit_records_answered_and_failed_turns() {
    let store = seeded_store().await;
    let sink = Arc::new(MemoryAuditSink::new());
    let audit: Arc<dyn AuditSink> = sink.clone();

    let answered = orchestrator(store.clone(), Arc::new(ScriptedProvider::text("Yes.")))
        .with_audit(audit.clone());
    answered.handle(ChatRequest::new("rust")).await.unwrap();

    let failed = orchestrator(store.clone(), Arc::new(ScriptedProvider::failing())).with_audit(audit);
    assert!(failed.handle(ChatRequest::new("rust")).await.is_err());

    for _ in 0..100 {
        if sink.entries().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let entries = sink.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.template == "rag_system"));
    assert!(entries.iter().any(|e| matches!(&e.outcome, AuditOutcome::Answered { response } if response == "Yes.")));
    assert!(entries.iter().any(|e| matches!(e.outcome, AuditOutcome::Failed { .. })));

    // A failed generation is not part of the conversation
    wait_for_turns(&store, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.turn_count().await, 1);
}

// ── Gateway ──────────────────────────────────────────────────────────────

async fn router(store: Arc<InMemoryStore>, provider: Arc<ScriptedProvider>) -> axum::Router {
    let state = Arc::new(GatewayState {
        orchestrator: Arc::new(orchestrator(store, provider)),
        request_timeout: Duration::from_secs(60),
    });
    build_router(state, &GatewayConfig::default())
}

async fn post_chat(app: axum::Router, body: &str) -> (StatusCode, ChatEnvelope) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn e2e_http_chat_returns_envelope() {
    let store = seeded_store().await;
    let app = router(store, Arc::new(ScriptedProvider::text("Rust, mostly."))).await;

    let (status, envelope) =
        post_chat(app, r#"{"message": "rust axum shop", "includeVoice": true}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert!(envelope.success);
    assert!(envelope.error.is_none());
    let data = envelope.data.unwrap();
    assert_eq!(data.response, "Rust, mostly.");
    assert!(!data.session_id.is_empty());
    assert_eq!(data.rag_context.results_count, 3);
    assert_eq!(data.rag_context.sources_used[0].source_type, "portfolio");
    let range = data.rag_context.relevance_range.unwrap();
    assert!(range.min <= range.max);
    assert_eq!(data.metadata.provider, "e2e_mock");
    assert_eq!(data.metadata.tokens_used, 120);
}

#[tokio::test]
async fn e2e_http_rejects_blank_message() {
    let store = seeded_store().await;
    let provider = Arc::new(ScriptedProvider::text("unused"));
    let app = router(store, provider.clone()).await;

    let (status, envelope) = post_chat(app, r#"{"message": "   "}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!envelope.success);
    assert_eq!(envelope.error.unwrap().code, "VALIDATION_ERROR");
    assert!(provider.prompts().is_empty());
}

#[tokio::test]
async fn e2e_http_provider_failure_is_bad_gateway() {
    let store = seeded_store().await;
    let app = router(store, Arc::new(ScriptedProvider::failing())).await;

    let (status, envelope) = post_chat(app, r#"{"message": "rust"}"#).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = envelope.error.unwrap();
    assert_eq!(error.code, "GENERATION_ERROR");
    assert!(!error.message.contains("connection refused"));
}

#[tokio::test]
async fn e2e_http_missing_template_is_configuration_error() {
    let app = router(
        Arc::new(InMemoryStore::new()),
        Arc::new(ScriptedProvider::text("unused")),
    )
    .await;

    let (status, envelope) = post_chat(app, r#"{"message": "rust"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(envelope.error.unwrap().code, "CONFIGURATION_ERROR");
}

// ── Binary ───────────────────────────────────────────────────────────────

fn folio(config: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_folio"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("FOLIO_DB_PATH")
        .env_remove("FOLIO_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run folio")
}

#[test]
fn e2e_cli_seeds_sqlite_and_lists_templates() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("folio.db");
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[store]\nbackend = \"sqlite\"\npath = {:?}\n",
            db.to_string_lossy()
        ),
    )
    .unwrap();
    let seed = dir.path().join("seed.json");
    std::fs::write(&seed, SEED).unwrap();

    let out = folio(&config, &["seed", seed.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Documents: 1 (2 fragments)"));
    assert!(stdout.contains("Templates: 1"));

    let out = folio(&config, &["templates"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("rag_system"));
}

#[test]
fn e2e_cli_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[retrieval]\nlimit = 0\n").unwrap();

    let out = folio(&config, &["config", "validate"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("retrieval.limit"));
}
