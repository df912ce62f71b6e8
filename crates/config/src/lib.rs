//! Configuration loading, validation, and management for Cadence.
//!
//! Loads configuration from `~/.cadence/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.cadence/config.toml`.
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

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Retry policy applied at the provider boundary
    #[serde(default)]
    pub retry: RetryConfig,

    /// Session persistence
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Interaction logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// The workflow to run
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
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
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("retry", &self.retry)
            .field("sessions", &self.sessions)
            .field("logging", &self.logging)
            .field("workflow", &self.workflow)
            .finish()
    }
}

/// Per-provider settings.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Exponential backoff settings for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Write one JSON file per session
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Session directory; defaults to `~/.cadence/sessions`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: true,
            dir: None,
        }
    }
}

impl SessionConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("sessions"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// JSONL file receiving one record per provider interaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_log: Option<PathBuf>,
}

/// Settings shared by every phase of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_name")]
    pub name: String,

    /// Upper bound on provider calls per phase
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Directory holding prompt templates (`<name>.md` / `<name>.txt`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,

    /// Directory for workflow artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File (inside `output_dir`) receiving the accumulated phase data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,

    /// Ordered phases
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

fn default_workflow_name() -> String {
    "default".into()
}
fn default_max_iterations() -> u32 {
    10
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: default_workflow_name(),
            max_iterations: default_max_iterations(),
            prompts_dir: None,
            output_dir: default_output_dir(),
            report_file: None,
            phases: Vec::new(),
        }
    }
}

/// One phase of a config-described workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,

    /// Template name or inline text for the system prompt
    pub system_prompt: String,

    /// Template name or inline text for the user message
    pub user_message: String,

    /// Tools this phase may call
    #[serde(default)]
    pub tools: Vec<String>,

    /// Keys that must be present in the previous phases' data
    #[serde(default)]
    pub required_keys: Vec<String>,

    /// Key under which non-JSON output is stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// Tool whose successful call ends the phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tool: Option<String>,

    #[serde(default)]
    pub force_tool_call: bool,

    /// Per-phase override of `WorkflowConfig::max_iterations`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Skip this phase when the accumulated data holds a truthy value here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_when: Option<String>,
}

impl PhaseConfig {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            tools: Vec::new(),
            required_keys: Vec::new(),
            output_key: None,
            completion_tool: None,
            force_tool_call: false,
            max_iterations: None,
            skip_when: None,
        }
    }
}

impl WorkflowConfig {
    /// Validate the workflow section on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "workflow.max_iterations must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for phase in &self.phases {
            if phase.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "every phase needs a non-empty name".into(),
                ));
            }
            if !seen.insert(phase.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate phase name '{}'",
                    phase.name
                )));
            }
            if phase.max_iterations == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "phase '{}' max_iterations must be at least 1",
                    phase.name
                )));
            }
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from the default path, with environment overrides.
    ///
    /// Priority: env vars > config file > defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CADENCE_*` and well-known provider env vars.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("CADENCE_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Ok(provider) = std::env::var("CADENCE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CADENCE_MODEL") {
            self.default_model = model;
        }
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
        dirs_home().join(".cadence")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        self.workflow.validate()
    }

    /// API key for a provider: provider-specific first, then the global one.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key_for(&self.default_provider).is_some()
    }

    /// Generate a default config TOML string (for `init`).
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
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            retry: RetryConfig::default(),
            sessions: SessionConfig::default(),
            logging: LoggingConfig::default(),
            workflow: WorkflowConfig::default(),
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

impl From<ConfigError> for cadence_core::Error {
    fn from(err: ConfigError) -> Self {
        cadence_core::Error::Config {
            message: err.to_string(),
        }
    }
}
