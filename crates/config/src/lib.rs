//! Configuration loading, validation, and management for deskpilot.
//!
//! Loads configuration from `~/.deskpilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod logging;

pub use logging::init_logging;

/// The root configuration structure.
///
/// Maps directly to `~/.deskpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Extended thinking budget. Unset disables thinking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    /// Appended to the built-in system prompt
    #[serde(default)]
    pub system_prompt_suffix: String,

    /// How many screenshots stay in the history. 0 keeps all of them.
    #[serde(default = "default_recent_images")]
    pub only_n_most_recent_images: usize,

    /// Mark recent turns as cacheable
    #[serde(default = "default_true")]
    pub prompt_caching: bool,

    /// Opt into token-efficient tool encoding
    #[serde(default = "default_true")]
    pub token_efficient_tools: bool,

    /// Transport settings for the model API
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Screen-control tool settings
    #[serde(default)]
    pub computer: ComputerConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_model() -> String {
    "claude-3-7-sonnet-20250219".into()
}
fn default_max_tokens() -> u32 {
    16384
}
fn default_recent_images() -> usize {
    3
}
fn default_true() -> bool {
    true
}

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
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("thinking_budget", &self.thinking_budget)
            .field("system_prompt_suffix", &self.system_prompt_suffix)
            .field("only_n_most_recent_images", &self.only_n_most_recent_images)
            .field("prompt_caching", &self.prompt_caching)
            .field("token_efficient_tools", &self.token_efficient_tools)
            .field("provider", &self.provider)
            .field("computer", &self.computer)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_max_retries() -> u32 {
    4
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    300
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerConfig {
    /// Settle time before the post-action screenshot
    #[serde(default = "default_screenshot_delay_ms")]
    pub screenshot_delay_ms: u64,

    /// Used when the actuator cannot report its screen size
    #[serde(default = "default_width")]
    pub fallback_width: u32,

    #[serde(default = "default_height")]
    pub fallback_height: u32,

    /// Characters sent per `type_text` call
    #[serde(default = "default_typing_group_size")]
    pub typing_group_size: usize,
}

fn default_screenshot_delay_ms() -> u64 {
    1000
}
fn default_width() -> u32 {
    1024
}
fn default_height() -> u32 {
    768
}
fn default_typing_group_size() -> usize {
    50
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            screenshot_delay_ms: default_screenshot_delay_ms(),
            fallback_width: default_width(),
            fallback_height: default_height(),
            typing_group_size: default_typing_group_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deskpilot/config.toml).
    ///
    /// Environment overrides:
    /// - `DESKPILOT_API_KEY`, then `ANTHROPIC_API_KEY`
    /// - `DESKPILOT_MODEL`
    /// - `WIDTH` / `HEIGHT` for the fallback screen size
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    /// Apply environment overrides through `lookup`, then re-validate.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("DESKPILOT_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY"));
        }

        if let Some(model) = lookup("DESKPILOT_MODEL") {
            self.model = model;
        }

        if let Some(width) = lookup("WIDTH") {
            self.computer.fallback_width = parse_env("WIDTH", &width)?;
        }
        if let Some(height) = lookup("HEIGHT") {
            self.computer.fallback_height = parse_env("HEIGHT", &height)?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deskpilot")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }

        if let Some(budget) = self.thinking_budget
            && budget >= self.max_tokens
        {
            return Err(ConfigError::ValidationError(
                "thinking_budget must be less than max_tokens".into(),
            ));
        }

        if self.computer.fallback_width == 0 || self.computer.fallback_height == 0 {
            return Err(ConfigError::ValidationError(
                "fallback screen dimensions must be > 0".into(),
            ));
        }

        if self.computer.typing_group_size == 0 {
            return Err(ConfigError::ValidationError(
                "typing_group_size must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} must be a positive integer, got '{value}'"))
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            thinking_budget: None,
            system_prompt_suffix: String::new(),
            only_n_most_recent_images: default_recent_images(),
            prompt_caching: true,
            token_efficient_tools: true,
            provider: ProviderConfig::default(),
            computer: ComputerConfig::default(),
            logging: LoggingConfig::default(),
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

    #[error("Failed to install log subscriber: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.max_tokens, 16384);
        assert_eq!(config.only_n_most_recent_images, 3);
        assert_eq!(config.provider.max_retries, 4);
        assert_eq!(config.computer.screenshot_delay_ms, 1000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.computer.typing_group_size, 50);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
model = "claude-sonnet-4-20250514"
thinking_budget = 2048
only_n_most_recent_images = 0

[computer]
screenshot_delay_ms = 250
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.thinking_budget, Some(2048));
        assert_eq!(config.only_n_most_recent_images, 0);
        assert_eq!(config.computer.screenshot_delay_ms, 250);
        assert_eq!(config.computer.fallback_width, 1024);
        assert!(config.prompt_caching);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_tokens = \"lots\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn thinking_budget_must_fit_in_max_tokens() {
        let config = AppConfig {
            max_tokens: 4096,
            thinking_budget: Some(4096),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, default_model());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("ANTHROPIC_API_KEY", "sk-test"),
                ("DESKPILOT_MODEL", "claude-x"),
                ("WIDTH", "1280"),
                ("HEIGHT", "800"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "claude-x");
        assert_eq!(config.computer.fallback_width, 1280);
        assert_eq!(config.computer.fallback_height, 800);
    }

    #[test]
    fn deskpilot_key_wins_over_anthropic_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("DESKPILOT_API_KEY", "sk-primary"),
                ("ANTHROPIC_API_KEY", "sk-secondary"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-primary"));
    }

    #[test]
    fn bad_dimension_env_rejected() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("WIDTH", "wide")])).unwrap_err();
        assert!(err.to_string().contains("WIDTH"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-3-7-sonnet-20250219"));
        assert!(toml_str.contains("[computer]"));
    }
}
