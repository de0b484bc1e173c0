//! Configuration loading, validation, and management for Folio.
//!
//! Loads configuration from `~/.folio/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! The retrieval thresholds, boosts, and budgets below are business tuning
//! values; the defaults reproduce the behaviour the site shipped with.

use folio_core::source::SourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.folio/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Ordered provider names to try after the default one fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_providers: Vec<String>,

    /// Retrieval (ranking) configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Prompt composition configuration
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Generation (completion call) configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Storage backend configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Per-turn audit log configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("providers", &self.providers)
            .field("fallback_providers", &self.fallback_providers)
            .field("retrieval", &self.retrieval)
            .field("context", &self.context)
            .field("prompt", &self.prompt)
            .field("generation", &self.generation)
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .field("audit", &self.audit)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Per-provider timeout inside a fallback chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum results handed to the context assembler
    #[serde(default = "default_retrieval_limit")]
    pub limit: usize,

    /// Similarity threshold applied before and after boosting
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,

    /// Source groups queried for every question
    #[serde(default = "SourceType::builtin")]
    pub source_groups: Vec<SourceType>,

    #[serde(default)]
    pub boosts: BoostConfig,

    /// Fall back to keyword matching when lexical search finds nothing
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    /// Stop-word list used by the keyword fallback ("es", "en")
    #[serde(default = "default_language")]
    pub stop_word_language: String,

    /// Timeout of a single source-group query
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_retrieval_limit() -> usize {
    8
}
fn default_min_relevance() -> f32 {
    0.3
}
fn default_language() -> String {
    "es".into()
}
fn default_store_timeout() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_retrieval_limit(),
            min_relevance: default_min_relevance(),
            source_groups: SourceType::builtin(),
            boosts: BoostConfig::default(),
            fallback_enabled: true,
            stop_word_language: default_language(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Score multipliers per source type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostConfig {
    #[serde(default = "default_document_boost")]
    pub document: f32,

    #[serde(default = "default_chunk_boost")]
    pub chunk: f32,

    #[serde(default = "default_portfolio_boost")]
    pub portfolio: f32,

    /// Boosts for additional source groups, keyed by group name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub other: HashMap<String, f32>,
}

fn default_document_boost() -> f32 {
    1.1
}
fn default_chunk_boost() -> f32 {
    1.0
}
fn default_portfolio_boost() -> f32 {
    1.2
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            document: default_document_boost(),
            chunk: default_chunk_boost(),
            portfolio: default_portfolio_boost(),
            other: HashMap::new(),
        }
    }
}

impl BoostConfig {
    /// Multiplier for a source type; unknown groups are left unboosted.
    pub fn factor(&self, source_type: &SourceType) -> f32 {
        match source_type {
            SourceType::Document => self.document,
            SourceType::Chunk => self.chunk,
            SourceType::Portfolio => self.portfolio,
            SourceType::Other(name) => self.other.get(name).copied().unwrap_or(1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Word budget of the assembled context block
    #[serde(default = "default_context_tokens")]
    pub max_tokens: usize,

    /// Characters kept per result before the ellipsis marker
    #[serde(default = "default_max_chars")]
    pub max_chars_per_result: usize,
}

fn default_context_tokens() -> usize {
    2000
}
fn default_max_chars() -> usize {
    800
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_tokens(),
            max_chars_per_result: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Name of the template that governs every turn
    #[serde(default = "default_template")]
    pub template: String,

    #[serde(default = "default_user_name")]
    pub default_user_name: String,

    /// Locale code substituted into `{language}`
    #[serde(default = "default_language")]
    pub language: String,

    /// Prior turns serialized into `{conversationHistory}`
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_template() -> String {
    "rag_system".into()
}
fn default_user_name() -> String {
    "Usuario".into()
}
fn default_history_turns() -> usize {
    3
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            default_user_name: default_user_name(),
            language: default_language(),
            history_turns: default_history_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model for answers; a fast, low-latency tier. Falls back to `default_model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_generation_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout of the completion call alone
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Timeout of the conversation-history lookup
    #[serde(default = "default_store_timeout")]
    pub history_timeout_secs: u64,
}

fn default_generation_tokens() -> u32 {
    800
}
fn default_temperature() -> f32 {
    0.4
}
fn default_generation_timeout() -> u64 {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_generation_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
            history_timeout_secs: default_store_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_db_path() -> String {
    AppConfig::config_dir()
        .join("folio.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Overall per-request timeout, above the generation timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,

    /// Origins allowed by CORS (empty = same-origin only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_origins: Vec<String>,

    /// Key rate limits on the first `X-Forwarded-For` hop instead of the
    /// peer address. Only enable behind a proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_request_timeout() -> u64 {
    60
}
fn default_rate_limit() -> usize {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            request_timeout_secs: default_request_timeout(),
            rate_limit_per_minute: default_rate_limit(),
            allowed_origins: vec![],
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory that receives one `rag-YYYY-MM-DD.jsonl` file per day
    #[serde(default = "default_audit_dir")]
    pub dir: String,
}

fn default_audit_dir() -> String {
    AppConfig::config_dir()
        .join("logs")
        .to_string_lossy()
        .into_owned()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_audit_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.folio/config.toml).
    ///
    /// Also checks environment variables:
    /// - `FOLIO_API_KEY` (highest priority), `OPENROUTER_API_KEY`, `OPENAI_API_KEY`
    /// - `FOLIO_PROVIDER`, `FOLIO_MODEL`, `FOLIO_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path` and apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("FOLIO_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("FOLIO_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("FOLIO_MODEL") {
            config.default_model = model;
        }

        if let Ok(path) = std::env::var("FOLIO_DB_PATH") {
            config.store.path = path;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".folio")
    }

    /// The model used for answers.
    pub fn generation_model(&self) -> &str {
        self.generation
            .model
            .as_deref()
            .unwrap_or(&self.default_model)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let min_relevance = self.retrieval.min_relevance;
        if !min_relevance.is_finite() || !(0.0..1.0).contains(&min_relevance) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_relevance must be in [0.0, 1.0)".into(),
            ));
        }

        if self.retrieval.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.timeout_secs must be > 0".into(),
            ));
        }

        if self.retrieval.limit == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.limit must be > 0".into(),
            ));
        }

        let boosts = &self.retrieval.boosts;
        let all_positive = [boosts.document, boosts.chunk, boosts.portfolio]
            .iter()
            .chain(boosts.other.values())
            .all(|b| *b > 0.0);
        if !all_positive {
            return Err(ConfigError::ValidationError(
                "retrieval.boosts must all be > 0".into(),
            ));
        }

        if self.context.max_tokens == 0 || self.context.max_chars_per_result == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_tokens and context.max_chars_per_result must be > 0".into(),
            ));
        }

        if self.prompt.template.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "prompt.template must name a template".into(),
            ));
        }

        if self.generation.timeout_secs == 0 || self.generation.history_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs and generation.history_timeout_secs must be > 0".into(),
            ));
        }

        if self.gateway.request_timeout_secs <= self.generation.timeout_secs {
            tracing::warn!(
                request_timeout = self.gateway.request_timeout_secs,
                generation_timeout = self.generation.timeout_secs,
                "gateway.request_timeout_secs does not exceed generation.timeout_secs"
            );
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            providers: HashMap::new(),
            fallback_providers: vec![],
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
            prompt: PromptConfig::default(),
            generation: GenerationConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
