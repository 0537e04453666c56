//! Model configuration loading.
//!
//! Settings come from an optional YAML file (with `${VAR}` /
//! `${VAR:-default}` interpolation), then the environment, then defaults.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use super::errors::InferenceError;
use crate::interpolate::interpolate_env_vars;

// ─── Defaults ────────────────────────────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const MODEL_ENV: &str = "MCP_RELAY_MODEL";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Resolved model API settings.
#[derive(Clone)]
pub struct ModelConfig {
    /// `None` is allowed here; the client refuses to start without one.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Prepended to the generated tool listing in the system message.
    pub system_preamble: Option<String>,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("system_preamble", &self.system_preamble)
            .finish()
    }
}

/// On-disk YAML shape. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfigFile {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub system_preamble: Option<String>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Load and parse a model configuration file.
///
/// Performs environment-variable interpolation on the raw text before
/// parsing.
pub fn load_model_config_file(path: &Path) -> Result<ModelConfigFile, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to parse model config: {e}"),
    })
}

/// Resolve the model configuration from an optional file plus the process
/// environment.
pub fn load_model_config(path: Option<&Path>) -> Result<ModelConfig, InferenceError> {
    let file = match path {
        Some(p) => load_model_config_file(p)?,
        None => ModelConfigFile::default(),
    };
    Ok(ModelConfig::resolve(file, |key| std::env::var(key).ok()))
}

impl ModelConfig {
    /// Merge file values over environment values over defaults.
    pub fn resolve(file: ModelConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let base_url = non_empty(file.base_url)
            .or_else(|| non_empty(env(BASE_URL_ENV)))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            api_key: non_empty(file.api_key).or_else(|| non_empty(env(API_KEY_ENV))),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: non_empty(file.model)
                .or_else(|| non_empty(env(MODEL_ENV)))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: file.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            system_preamble: non_empty(file.system_preamble),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
