use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub allowed_user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BotConfig {
    /// User ids allowed to run admin-only commands
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Answer messages no command matched with a hint to `help`
    #[serde(default = "default_reply_unknown_command")]
    pub reply_unknown_command: bool,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            reply_unknown_command: default_reply_unknown_command(),
            history_size: default_history_size(),
        }
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_reply_unknown_command() -> bool {
    true
}

fn default_history_size() -> usize {
    10
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }
}
