//! Service configuration, persisted as TOML in the config directory.
//!
//! Every field has a serde default so a partial config file (or none at
//! all) still yields a working service. API keys are never stored here;
//! they come from the environment (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Loan period in days added at checkout to compute the due date.
    #[serde(default = "default_loan_days")]
    pub loan_days: i64,
    #[serde(default)]
    pub ai: AiConfig,
}

/// Generation gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider strategy: "mock", "openai", or "anthropic". Unknown names
    /// resolve to the mock.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name passed to live providers.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    /// Hard timeout for one outbound generation call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prompt text sent to live providers is truncated to this length.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_loan_days() -> i64 {
    14
}
fn default_provider() -> String {
    "mock".into()
}
fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".into()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_prompt_chars() -> usize {
    2000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            loan_days: default_loan_days(),
            ai: AiConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            openai_base_url: default_openai_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
            timeout_secs: default_timeout_secs(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
