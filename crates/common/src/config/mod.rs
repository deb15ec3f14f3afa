//! Configuration management for DocGuard services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Legacy variables (ANTHROPIC_API_KEY, LLM_MODEL, ...) as fallbacks
//! - Default values

use crate::errors::AppError;
use crate::MAX_PASSAGES;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Legacy environment variables and the config keys they feed.
/// `APP__` variables and config files take precedence over these.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("ANTHROPIC_API_KEY", "llm.api_key"),
    ("LLM_MODEL", "llm.model"),
    ("OPENAI_API_KEY", "embedding.api_key"),
    ("OPENAI_EMBED_MODEL", "embedding.model"),
    ("EMBEDDING_BACKEND", "embedding.provider"),
    ("INDEX_DIR", "index.dir"),
];

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval contract configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Document loading and chunking
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Index snapshot location
    #[serde(default)]
    pub index: IndexConfig,

    /// Audit log configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds; must exceed the LLM and embedding timeouts combined
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Seconds a session may sit idle before it is evicted from memory
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Provider: anthropic, offline
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key (an empty key selects the offline model)
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Synthesis timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (hashing provider)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Minimum similarity score for a passage (higher = stricter)
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Passages per query; values above the hard cap are clamped
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Accepted file extensions (lowercase, without dot)
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Directory that ingestion paths must resolve inside
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Directory for index snapshots (unset disables persistence)
    #[serde(default = "default_index_dir")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// JSON-lines audit file
    #[serde(default = "default_audit_path")]
    pub path: String,

    /// Host identifier override (defaults to the machine hostname)
    pub host_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (whole process)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 150 }
fn default_max_body_bytes() -> usize { 10 * 1024 * 1024 }
fn default_llm_provider() -> String { "anthropic".to_string() }
fn default_llm_model() -> String { "claude-3-5-sonnet-20241022".to_string() }
fn default_max_tokens() -> u32 { 1024 }
fn default_llm_timeout() -> u64 { 90 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 64 }
fn default_score_threshold() -> f32 { 0.30 }
fn default_top_k() -> usize { MAX_PASSAGES }
fn default_chunk_size() -> usize { 1200 }
fn default_chunk_overlap() -> usize { 150 }
fn default_extensions() -> Vec<String> { vec!["pdf".into(), "txt".into(), "md".into()] }
fn default_upload_dir() -> String { "storage/uploads".to_string() }
fn default_session_idle() -> u64 { 3600 }
fn default_index_dir() -> Option<String> { Some("storage/index".to_string()) }
fn default_audit_path() -> String { "logs/rag_guardrails.jsonl".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "docguard".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

/// Upper bound for the score threshold slider
pub const MAX_SCORE_THRESHOLD: f32 = 0.9;

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder();

        // Legacy variables act as defaults so APP__ and files win
        for (var, key) in LEGACY_ENV_KEYS {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    builder = builder.set_default(*key, value)?;
                }
            }
        }

        let config = builder
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__SCORE_THRESHOLD=0.45
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> Result<(), AppError> {
        let threshold = self.retrieval.score_threshold;
        if !(0.0..=MAX_SCORE_THRESHOLD).contains(&threshold) {
            return Err(AppError::Configuration {
                message: format!(
                    "retrieval.score_threshold must be within 0.0..={}, got {}",
                    MAX_SCORE_THRESHOLD, threshold
                ),
            });
        }

        if self.ingestion.chunk_size == 0 {
            return Err(AppError::Configuration {
                message: "ingestion.chunk_size must be positive".to_string(),
            });
        }

        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            return Err(AppError::Configuration {
                message: format!(
                    "ingestion.chunk_overlap ({}) must be smaller than chunk_size ({})",
                    self.ingestion.chunk_overlap, self.ingestion.chunk_size
                ),
            });
        }

        if self.ingestion.upload_dir.trim().is_empty() {
            return Err(AppError::Configuration {
                message: "ingestion.upload_dir must not be empty".to_string(),
            });
        }

        if self.server.session_idle_secs == 0 {
            return Err(AppError::Configuration {
                message: "server.session_idle_secs must be positive".to_string(),
            });
        }

        let stage_budget = self.llm.timeout_secs + self.embedding.timeout_secs;
        if self.server.request_timeout_secs <= stage_budget {
            return Err(AppError::Configuration {
                message: format!(
                    "server.request_timeout_secs ({}) must exceed llm.timeout_secs + embedding.timeout_secs ({})",
                    self.server.request_timeout_secs, stage_budget
                ),
            });
        }

        if self.embedding.dimension == 0 {
            return Err(AppError::Configuration {
                message: "embedding.dimension must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Passages per query after applying the hard cap
    pub fn top_k(&self) -> usize {
        self.retrieval.top_k.clamp(1, MAX_PASSAGES)
    }

    /// Get synthesis timeout as Duration
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    /// Idle time after which a session leaves memory
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.server.session_idle_secs)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Index snapshot directory, if persistence is enabled
    pub fn index_dir(&self) -> Option<PathBuf> {
        self.index
            .dir
            .as_deref()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            session_idle_secs: default_session_idle(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            top_k: default_top_k(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            allowed_extensions: default_extensions(),
            upload_dir: default_upload_dir(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
            host_id: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}
