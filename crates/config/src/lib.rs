//! Configuration loading and validation for snowdesk.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! for secrets. Every setting has a serde default so a minimal file (or none
//! at all) yields a working configuration pointed at the public endpoints.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default coordinates used when the caller supplies no location hint
/// (Anchorage).
pub const DEFAULT_LATITUDE: f64 = 61.2181;
pub const DEFAULT_LONGITUDE: f64 = -149.9003;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub location: LocationConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("safety", &self.safety)
            .field("retrieval", &self.retrieval)
            .field("weather", &self.weather)
            .field("location", &self.location)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible chat-completions base URL.
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model_name")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System instruction prepended to every dialogue.
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    /// Per-call request timeout in seconds.
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_endpoint() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model_name() -> String {
    "gemini-2.5-pro".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_model_timeout_secs() -> u64 {
    120
}

fn default_system_instruction() -> String {
    "You are an AI assistant for a municipal snow department. Help citizens \
     with questions about snow removal services, road conditions, closures, \
     winter safety, and current weather. Answer only from the FAQ context and \
     weather data the tools provide; if the context does not contain the \
     answer, say so politely. Do not make up information."
        .into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            api_key: None,
            model: default_model_name(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_instruction: default_system_instruction(),
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Sanitize endpoint for user prompts.
    #[serde(default)]
    pub input_endpoint: String,

    /// Sanitize endpoint for model responses.
    #[serde(default)]
    pub output_endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Fixed per-call timeout in seconds.
    #[serde(default = "default_safety_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_safety_timeout_secs() -> u64 {
    30
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            input_endpoint: String::new(),
            output_endpoint: String::new(),
            api_key: None,
            timeout_secs: default_safety_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for SafetyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyConfig")
            .field("input_endpoint", &self.input_endpoint)
            .field("output_endpoint", &self.output_endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Vector-search endpoint over the FAQ corpus.
    #[serde(default)]
    pub endpoint: String,

    /// Number of nearest passages to request.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_top_k() -> usize {
    3
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            top_k: default_top_k(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// TTL for cached alert/forecast responses, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Governing region for alert queries (state code).
    #[serde(default = "default_region")]
    pub region: String,

    /// User-Agent the weather API requires.
    #[serde(default = "default_weather_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_weather_base_url() -> String {
    "https://api.weather.gov".into()
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_region() -> String {
    "AK".into()
}
fn default_weather_user_agent() -> String {
    "(snowdesk agent, contact@snowdesk.example)".into()
}
fn default_weather_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            cache_ttl_secs: default_cache_ttl_secs(),
            region: default_region(),
            user_agent: default_weather_user_agent(),
            timeout_secs: default_weather_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

fn default_latitude() -> f64 {
    DEFAULT_LATITUDE
}
fn default_longitude() -> f64 {
    DEFAULT_LONGITUDE
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus env overrides; used when no config file exists.
    pub fn from_env() -> Self {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config
    }

    /// Secrets and endpoints may be supplied via environment variables,
    /// which win over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("SNOWDESK_MODEL_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("SNOWDESK_MODEL_ENDPOINT") {
            self.model.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("SNOWDESK_SAFETY_API_KEY") {
            self.safety.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("SNOWDESK_RETRIEVAL_ENDPOINT") {
            self.retrieval.endpoint = endpoint;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be in [0.0, 2.0], got {}",
                self.model.temperature
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be at least 1".into()));
        }
        Ok(())
    }
}
