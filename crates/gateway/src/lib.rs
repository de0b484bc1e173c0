//! HTTP gateway for Folio.
//!
//! Exposes `POST /v1/chat` (the question-answering endpoint used by the
//! portfolio site) and `GET /health`.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use folio_config::{AppConfig, GatewayConfig};
use folio_core::error::{ProviderError, StoreError};
use folio_rag::{ConversationOrchestrator, JsonlFileSink};
use folio_store::Backend;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::api::ApiError;

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Upper bound on one chat request, generation included
    pub request_timeout: Duration,
}

pub type SharedState = Arc<GatewayState>;

/// Failures while bringing the gateway up.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Provider unavailable: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the Axum router.
///
/// Layers applied:
/// - CORS restricted to the configured origins
/// - Request body size limit
/// - In-memory rate limiting per client on `/v1`
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_per_minute,
        Duration::from_secs(60),
    ));
    let trust_forwarded_for = config.trust_forwarded_for;

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/v1/chat", post(api::chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, trust_forwarded_for, req, next)
        }))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Assemble the pipeline described by `config`: store, provider chain,
/// orchestrator and (when enabled) the audit log.
pub async fn build_orchestrator(
    config: &AppConfig,
) -> Result<(Arc<dyn Backend>, ConversationOrchestrator), GatewayError> {
    let backend = folio_store::open_backend(&config.store).await?;
    let provider = folio_providers::answer_provider(config)?;

    let mut orchestrator = ConversationOrchestrator::from_config(
        config,
        backend.clone(),
        backend.clone(),
        backend.clone(),
        provider,
    );
    if config.audit.enabled {
        orchestrator = orchestrator.with_audit(Arc::new(JsonlFileSink::new(&config.audit.dir)));
    }

    info!(
        store = backend.name(),
        provider = orchestrator.provider_name(),
        model = %orchestrator.settings().model,
        "Pipeline ready"
    );
    Ok((backend, orchestrator))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let (_backend, orchestrator) = build_orchestrator(&config).await?;
    let state = Arc::new(GatewayState {
        orchestrator: Arc::new(orchestrator),
        request_timeout: Duration::from_secs(config.gateway.request_timeout_secs),
    });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| GatewayError::Bind {
            addr: addr.clone(),
            source,
        })?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(GatewayError::Serve)?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Client key for rate limiting: the peer IP, or the first
/// `X-Forwarded-For` hop when the gateway is configured to trust its proxy.
fn client_key(req: &axum::extract::Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| peer.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Rate limiting middleware. `/health` is exempt.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    trust_forwarded_for: bool,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let client_key = client_key(&req, trust_forwarded_for);

    if !limiter.check(&client_key) {
        warn!(client = %client_key, "Rate limit exceeded");
        return ApiError::new(
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Too many messages. Please wait a moment.",
        )
        .into_response();
    }

    next.run(req).await
}
