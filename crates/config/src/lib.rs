//! Configuration loading, validation, and management for spotctl.
//!
//! Loads configuration from `~/.spotctl/config.toml`, merges credentials
//! saved by `spotctl auth` from `~/.spotctl/credentials.toml`, then applies
//! environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use spotctl_core::RateLimitPolicy;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.spotctl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default LLM provider: "openai" or "anthropic"
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub execution: ExecutionSettings,

    #[serde(default)]
    pub spotify: SpotifySettings,

    /// Per-action rate-limit overrides, keyed by action name
    #[serde(default)]
    pub rate_limits: BTreeMap<String, RateLimitOverride>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Default model for a known provider name.
pub fn default_model_for(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("gpt-4o-mini"),
        "anthropic" => Some("claude-3-5-sonnet-20241022"),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum model round-trips per prompt
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    #[serde(default = "default_true")]
    pub enable_streaming: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Write the session back to disk after `ask --session`
    #[serde(default = "default_true")]
    pub auto_save_context: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_steps() -> u32 {
    5
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            enable_streaming: true,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            auto_save_context: true,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_true")]
    pub enable_rate_limit: bool,

    /// Attempts per action, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff; attempt n waits `retry_delay_ms * n`
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_true")]
    pub enable_logging: bool,
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            enable_rate_limit: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            enable_logging: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SpotifySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/callback".into()
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            access_token: None,
            refresh_token: None,
        }
    }
}

impl std::fmt::Debug for SpotifySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifySettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

impl SpotifySettings {
    pub fn has_tokens(&self) -> bool {
        self.access_token.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitOverride {
    pub max_calls: u32,
    pub window_ms: u64,
}

impl From<RateLimitOverride> for RateLimitPolicy {
    fn from(o: RateLimitOverride) -> Self {
        RateLimitPolicy::new(o.max_calls, o.window_ms)
    }
}

/// Tokens persisted by `spotctl auth`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

impl StoredCredentials {
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(write_err)
    }
}

impl AppConfig {
    /// Load configuration from the default locations.
    ///
    /// Precedence, lowest to highest: config file, saved credentials,
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_layered(
            &Self::config_dir().join("config.toml"),
            &Self::credentials_path(),
            |key| std::env::var(key).ok(),
        )
    }

    /// Load with explicit paths and environment lookup.
    pub fn load_layered(
        config_path: &Path,
        credentials_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(config_path)?;

        if let Some(saved) = StoredCredentials::load_from(credentials_path)? {
            if saved.access_token.is_some() {
                config.spotify.access_token = saved.access_token;
            }
            if saved.refresh_token.is_some() {
                config.spotify.refresh_token = saved.refresh_token;
            }
        }

        config.apply_env_overrides(env);
        config.validate()?;
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

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = env("DEFAULT_AI_PROVIDER") {
            self.default_provider = provider;
        }

        for (provider, key_var, model_var) in [
            ("openai", "OPENAI_API_KEY", "OPENAI_MODEL"),
            ("anthropic", "ANTHROPIC_API_KEY", "ANTHROPIC_MODEL"),
        ] {
            let key = env(key_var);
            let model = env(model_var);
            if key.is_none() && model.is_none() {
                continue;
            }
            let entry = self.providers.entry(provider.to_string()).or_default();
            if key.is_some() {
                entry.api_key = key;
            }
            if model.is_some() {
                entry.model = model;
            }
        }

        if let Some(steps) = env("AI_MAX_STEPS") {
            match steps.parse() {
                Ok(n) => self.agent.max_steps = n,
                Err(_) => tracing::warn!(value = %steps, "Ignoring non-numeric AI_MAX_STEPS"),
            }
        }
        if let Some(streaming) = env("AI_ENABLE_STREAMING") {
            self.agent.enable_streaming = streaming != "false";
        }

        if let Some(v) = env("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = Some(v);
        }
        if let Some(v) = env("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = Some(v);
        }
        if let Some(v) = env("SPOTIFY_REDIRECT_URI") {
            self.spotify.redirect_uri = v;
        }
        if let Some(v) = env("ACCESS_TOKEN") {
            self.spotify.access_token = Some(v);
        }
        if let Some(v) = env("REFRESH_TOKEN") {
            self.spotify.refresh_token = Some(v);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".spotctl")
    }

    pub fn credentials_path() -> PathBuf {
        Self::config_dir().join("credentials.toml")
    }

    /// Directory holding saved session contexts.
    pub fn contexts_dir() -> PathBuf {
        Self::config_dir().join("contexts")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if default_model_for(&self.default_provider).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "default_provider must be 'openai' or 'anthropic', got '{}'",
                self.default_provider
            )));
        }

        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError("agent.max_steps must be at least 1".into()));
        }

        if self.execution.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "execution.max_retries must be at least 1".into(),
            ));
        }

        if let Some((name, _)) = self.rate_limits.iter().find(|(_, o)| o.window_ms == 0) {
            return Err(ConfigError::ValidationError(format!(
                "rate_limits.{name}.window_ms must be greater than 0"
            )));
        }

        Ok(())
    }

    /// The configured provider entry with its model defaulted.
    pub fn provider_config(&self, name: &str) -> ProviderConfig {
        let mut config = self.providers.get(name).cloned().unwrap_or_default();
        if config.model.is_none() {
            config.model = default_model_for(name).map(String::from);
        }
        config
    }

    pub fn has_api_key(&self) -> bool {
        self.provider_config(&self.default_provider).api_key.is_some()
    }

    pub fn rate_limit_override(&self, action: &str) -> Option<RateLimitPolicy> {
        self.rate_limits.get(action).copied().map(Into::into)
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
            default_provider: default_provider(),
            providers: HashMap::new(),
            agent: AgentSettings::default(),
            execution: ExecutionSettings::default(),
            spotify: SpotifySettings::default(),
            rate_limits: BTreeMap::new(),
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

    #[error("Failed to write {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.execution.max_retries, 3);
        assert_eq!(config.execution.retry_delay_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.spotify.redirect_uri, config.spotify.redirect_uri);
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = AppConfig {
            default_provider: "openrouter".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retries_rejected() {
        let mut config = AppConfig::default();
        config.execution.max_retries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn provider_model_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.provider_config("anthropic").model.as_deref(), Some("claude-3-5-sonnet-20241022"));
        assert_eq!(config.provider_config("openai").model.as_deref(), Some("gpt-4o-mini"));
        assert!(!config.has_api_key());
    }

    #[test]
    fn rate_limit_overrides_parse() {
        let config: AppConfig = toml::from_str(
            r#"
            [rate_limits.search_tracks]
            max_calls = 10
            window_ms = 60000
            "#,
        )
        .unwrap();
        assert_eq!(
            config.rate_limit_override("search_tracks"),
            Some(RateLimitPolicy::new(10, 60_000))
        );
        assert!(config.rate_limit_override("like_songs").is_none());
    }

    #[test]
    fn env_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let env = |key: &str| match key {
            "DEFAULT_AI_PROVIDER" => Some("anthropic".to_string()),
            "ANTHROPIC_API_KEY" => Some("sk-ant".to_string()),
            "AI_MAX_STEPS" => Some("8".to_string()),
            "AI_ENABLE_STREAMING" => Some("no".to_string()),
            "ACCESS_TOKEN" => Some("env-token".to_string()),
            _ => None,
        };
        let config = AppConfig::load_layered(
            &dir.path().join("config.toml"),
            &dir.path().join("credentials.toml"),
            env,
        )
        .unwrap();

        assert_eq!(config.default_provider, "anthropic");
        assert!(config.has_api_key());
        assert_eq!(config.agent.max_steps, 8);
        // Only the literal "false" disables streaming
        assert!(config.agent.enable_streaming);
        assert_eq!(config.spotify.access_token.as_deref(), Some("env-token"));
    }

    #[test]
    fn saved_credentials_layer_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let creds_path = dir.path().join("nested").join("credentials.toml");
        std::fs::write(
            &config_path,
            "[spotify]\naccess_token = \"file-token\"\nrefresh_token = \"file-refresh\"\n",
        )
        .unwrap();

        StoredCredentials {
            access_token: Some("saved-token".into()),
            refresh_token: None,
        }
        .save_to(&creds_path)
        .unwrap();

        let config = AppConfig::load_layered(&config_path, &creds_path, no_env).unwrap();
        assert_eq!(config.spotify.access_token.as_deref(), Some("saved-token"));
        assert_eq!(config.spotify.refresh_token.as_deref(), Some("file-refresh"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.spotify.client_secret = Some("top-secret".into());
        config.spotify.access_token = Some("bearer-xyz".into());
        let printed = format!("{config:?}");
        assert!(!printed.contains("top-secret"));
        assert!(!printed.contains("bearer-xyz"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("default_provider = \"openai\""));
        assert!(toml_str.contains("max_retries = 3"));
    }
}
