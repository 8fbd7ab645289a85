//! Configuration for deedd

use deed_core::Question;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_LOG_FILTER: &str = "deed_service=info,deed_core=info,info";

/// Slack on top of the worst-case classifier time for the rest of a request.
const REQUEST_TIMEOUT_MARGIN_MS: u64 = 5_000;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Text classifier backend
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Confidence attached to responses
    #[serde(default)]
    pub confidence: ConfidenceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Origins allowed by CORS; `*` allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Request timeout in seconds, 0 disables it
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            allowed_origins: default_allowed_origins(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// Coin-flip placeholder
    Random,
    /// Fixed answers from `answers` / `default_answer`
    Scripted,
    /// OpenAI-compatible chat-completions endpoint
    ChatCompletion,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_backend")]
    pub backend: ClassifierBackend,

    /// Chat-completions endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Chat model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; falls back to DEED_CLASSIFIER_API_KEY when unset
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout in milliseconds, 0 disables it
    #[serde(default = "default_classifier_timeout")]
    pub timeout_ms: u64,

    /// Scripted backend: answer for questions not listed in `answers`
    #[serde(default)]
    pub default_answer: bool,

    /// Scripted backend: answers keyed by question key
    #[serde(default)]
    pub answers: BTreeMap<String, bool>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_ms: default_classifier_timeout(),
            default_answer: false,
            answers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMode {
    Uniform,
    Fixed,
}

/// Confidence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    #[serde(default = "default_confidence_mode")]
    pub mode: ConfidenceMode,

    /// Used by `fixed` mode; clamped into [0.7, 0.95)
    #[serde(default = "default_confidence_value")]
    pub value: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            mode: default_confidence_mode(),
            value: default_confidence_value(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_request_timeout() -> u64 {
    60
}

fn default_backend() -> ClassifierBackend {
    ClassifierBackend::Random
}

fn default_endpoint() -> String {
    deed_adapters::chat::DEFAULT_CHAT_ENDPOINT.to_string()
}

fn default_model() -> String {
    deed_adapters::chat::DEFAULT_CHAT_MODEL.to_string()
}

fn default_classifier_timeout() -> u64 {
    15_000
}

fn default_confidence_mode() -> ConfidenceMode {
    ConfidenceMode::Uniform
}

fn default_confidence_value() -> f64 {
    0.85
}

fn default_log_level() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl ServiceConfig {
    /// Load configuration: defaults, then the optional file, then `DEED_` environment
    /// variables (`DEED_SERVER__LISTEN_ADDR`, `DEED_CLASSIFIER__BACKEND`, ...).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ServiceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DEED")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Request timeout applied by the router, or `None` when disabled.
    ///
    /// Never shorter than every classifier question timing out in turn, so a slow
    /// evaluation ends in its own result or classifier failure rather than a 408.
    pub fn request_timeout(&self) -> Option<Duration> {
        if self.server.request_timeout_secs == 0 {
            return None;
        }
        let configured_ms = self.server.request_timeout_secs.saturating_mul(1_000);
        let classifier_ms = match self.classifier.timeout_ms {
            0 => 0,
            per_call => per_call
                .saturating_mul(Question::ALL.len() as u64)
                .saturating_add(REQUEST_TIMEOUT_MARGIN_MS),
        };
        Some(Duration::from_millis(configured_ms.max(classifier_ms)))
    }
}
