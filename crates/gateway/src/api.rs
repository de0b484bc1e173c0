//! The chat API: request/response envelopes and handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use folio_core::error::ProviderError;
use folio_rag::{ChatOutcome, ChatRequest, PipelineError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::SharedState;

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Speech synthesis happens in the browser; accepted for compatibility.
    #[serde(default)]
    pub include_voice: bool,
}

/// Every response from `/v1/chat` has this shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChatData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatData {
    pub response: String,
    pub session_id: String,
    pub timestamp: String,
    pub rag_context: RagContextDto,
    pub metadata: MetadataDto,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagContextDto {
    pub results_count: usize,
    pub sources_used: Vec<SourceDto>,
    pub relevance_range: Option<RelevanceRangeDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDto {
    pub source_type: String,
    pub relevance_score: f32,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelevanceRangeDto {
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDto {
    pub provider: String,
    pub model: String,
    pub tokens_used: u32,
    pub processing_time_seconds: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<ChatOutcome> for ChatData {
    fn from(outcome: ChatOutcome) -> Self {
        Self {
            response: outcome.response_text,
            session_id: outcome.session_id.to_string(),
            timestamp: rfc3339(outcome.timestamp),
            rag_context: RagContextDto {
                results_count: outcome.results_count,
                sources_used: outcome
                    .sources_used
                    .into_iter()
                    .map(|s| SourceDto {
                        source_type: s.source_type.to_string(),
                        relevance_score: s.relevance_score,
                        id: s.id,
                    })
                    .collect(),
                relevance_range: outcome
                    .relevance_range
                    .map(|(min, max)| RelevanceRangeDto { min, max }),
            },
            metadata: MetadataDto {
                provider: outcome.provider,
                model: outcome.model,
                tokens_used: outcome.tokens_used,
                processing_time_seconds: outcome.processing_time.as_secs_f64(),
            },
        }
    }
}

/// A failed request, rendered as an envelope with its status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::TemplateMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Generation(ProviderError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.code(), e.public_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ChatEnvelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                message: self.message,
                code: self.code.to_string(),
                timestamp: rfc3339(Utc::now()),
            }),
        };
        (self.status, Json(envelope)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatEnvelope>, ApiError> {
    let Json(body) = payload.map_err(|rejection| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("Invalid request body: {}", rejection.body_text()),
        )
    })?;

    if body.include_voice {
        debug!("Voice requested; synthesis is left to the client");
    }

    let request = ChatRequest {
        message: body.message,
        session_id: body.session_id,
        user_name: None,
    };

    let outcome = tokio::time::timeout(state.request_timeout, state.orchestrator.handle(request))
        .await
        .map_err(|_| {
            warn!(
                timeout_secs = state.request_timeout.as_secs(),
                "Chat request timed out"
            );
            ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "REQUEST_TIMEOUT",
                "The request took too long. Please try again.",
            )
        })??;

    Ok(Json(ChatEnvelope {
        success: true,
        data: Some(outcome.into()),
        error: None,
    }))
}

pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        provider: state.orchestrator.provider_name().into(),
    })
}
