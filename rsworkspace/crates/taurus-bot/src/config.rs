//! Configuration management for taurus-bot

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use llm_gemini::config::{DEFAULT_API_BASE, DEFAULT_PRODIA_BASE};
use llm_gemini::GeminiConfig;
use serde::{Deserialize, Serialize};

/// Source of environment variables, swappable in tests.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Option<String>;
}

/// Delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordBotConfig,
    #[serde(default)]
    pub gemini: GeminiSection,
    #[serde(default)]
    pub bot: BotSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordBotConfig {
    /// Bot token from the Discord developer portal
    #[serde(default)]
    pub bot_token: String,
    /// Users allowed to run `/model` and `/apikey`
    #[serde(default)]
    pub owners: Vec<u64>,
    /// Credited in the loading embed as the integrator
    #[serde(default)]
    pub integrator_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSection {
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_prodia_base")]
    pub prodia_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            api_base: default_api_base(),
            prodia_base: default_prodia_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSection {
    /// JSON settings store written by the owner commands
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    /// One personality instruction per line
    #[serde(default = "default_personality_path")]
    pub personality_path: String,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            personality_path: default_personality_path(),
            health_port: default_health_port(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&SystemEnv)
    }

    pub fn from_env_with<E: ReadEnv>(env: &E) -> Result<Self> {
        let bot_token = env
            .var("DISCORD_BOT_TOKEN")
            .filter(|v| !v.is_empty())
            .context("DISCORD_BOT_TOKEN not set")?;

        let owners = parse_id_list(&env.var("TAURUS_OWNERS").unwrap_or_default());

        let integrator_id = env
            .var("TAURUS_INTEGRATOR_ID")
            .and_then(|v| v.trim().parse().ok());

        let defaults = GeminiSection::default();
        let gemini = GeminiSection {
            primary_model: env
                .var("GEMINI_PRIMARY_MODEL")
                .unwrap_or(defaults.primary_model),
            fallback_model: env
                .var("GEMINI_FALLBACK_MODEL")
                .unwrap_or(defaults.fallback_model),
            api_base: env.var("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            prodia_base: env.var("PRODIA_API_BASE").unwrap_or(defaults.prodia_base),
            request_timeout_secs: env
                .var("GEMINI_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
        };

        let defaults = BotSection::default();
        let bot = BotSection {
            settings_path: env
                .var("TAURUS_SETTINGS_PATH")
                .unwrap_or(defaults.settings_path),
            personality_path: env
                .var("TAURUS_PERSONALITY_PATH")
                .unwrap_or(defaults.personality_path),
            health_port: env
                .var("HEALTH_CHECK_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.health_port),
        };

        Ok(Config {
            discord: DiscordBotConfig {
                bot_token,
                owners,
                integrator_id,
            },
            gemini,
            bot,
        })
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.discord.owners.contains(&user_id)
    }

    pub fn gemini_client_config(&self) -> GeminiConfig {
        let mut config = GeminiConfig::default()
            .with_api_base(self.gemini.api_base.clone())
            .with_prodia_base(self.gemini.prodia_base.clone());
        config.request_timeout = Duration::from_secs(self.gemini.request_timeout_secs);
        config
    }
}

fn default_primary_model() -> String {
    "gemini-1.5-pro-latest".to_string()
}

fn default_fallback_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_prodia_base() -> String {
    DEFAULT_PRODIA_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

fn default_personality_path() -> String {
    "personality.txt".to_string()
}

fn default_health_port() -> u16 {
    3001
}

pub(crate) fn parse_id_list(s: &str) -> Vec<u64> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .filter_map(|x| x.parse::<u64>().ok())
        .collect()
}
