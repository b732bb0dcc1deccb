//! Configuration management for gitee-issue

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// User configuration, read from `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Base URL of the issue tracker REST API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// HTTP request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_base() -> String {
    "https://gitee.com/api/v5".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("gitee-issue/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Load config from file, or defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }
}
