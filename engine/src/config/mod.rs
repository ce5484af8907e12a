//! Configuration management
//!
//! Loading, validation, and defaults for the Burrow configuration.
//! Configuration is stored in TOML format at ~/.burrow/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **telegram**: Bot token, webhook URL, authorization, bind address
//! - **llm**: Chat completions endpoint, model, API key, temperature
//! - **redis**: Connection URL for persisted conversation memory
//! - **memory**: Window size and backing store selection

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Config(String),
}

/// Main configuration structure
///
/// Represents the complete Burrow configuration loaded from
/// ~/.burrow/config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Telegram transport configuration
    pub telegram: TelegramConfig,

    /// LLM backend configuration
    pub llm: LlmConfig,

    /// Redis connection settings
    #[serde(default)]
    pub redis: RedisConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Telegram transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token from @BotFather
    pub bot_token: String,

    /// Public HTTPS URL Telegram delivers updates to
    pub webhook_url: String,

    /// Username allowed to talk to the bot; unset means open to everyone
    #[serde(default)]
    pub authorized_username: Option<String>,

    /// Local address the webhook server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

/// LLM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum non-system messages retained per conversation
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Backing store: "redis" (persisted) or "memory" (process-local,
    /// lost on restart)
    #[serde(default = "default_memory_backend")]
    pub backend: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            backend: default_memory_backend(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_window_size() -> usize {
    crate::memory::DEFAULT_WINDOW_SIZE
}

fn default_memory_backend() -> String {
    "redis".to_string()
}

impl Config {
    /// Load configuration from the default location (~/.burrow/config.toml)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be read, fails to
    /// parse, or fails validation. Unlike workspace-style tools there is no
    /// useful default here: the bot token and API key have no defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            return Err(ConfigError::Config(format!(
                "No config file at {:?}. Create one with [telegram] and [llm] sections.",
                config_path
            )));
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.burrow/config.toml)
    fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".burrow").join("config.toml"))
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(ConfigError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::Config(
                "telegram.bot_token must not be empty".to_string(),
            ));
        }

        if !self.telegram.webhook_url.starts_with("https://") {
            return Err(ConfigError::Config(
                "telegram.webhook_url must be an https:// URL".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Config(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.memory.window_size == 0 {
            return Err(ConfigError::Config(
                "memory.window_size must be at least 1".to_string(),
            ));
        }

        if !["redis", "memory"].contains(&self.memory.backend.as_str()) {
            return Err(ConfigError::Config(format!(
                "Invalid memory backend '{}'. Must be 'redis' or 'memory'",
                self.memory.backend
            )));
        }

        Ok(())
    }
}
