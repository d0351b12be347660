//! Copilot configuration.
//!
//! Settings are read from a TOML file (sections `[llm]`, `[platform]`,
//! `[poller]` and `[web]`) and then overlaid with environment variables, so
//! secrets never have to live in the file.  A missing file yields defaults.
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `DATAOPS_LLM_PROVIDER` | `llm.provider` |
//! | `DATAOPS_LLM_MODEL` | `llm.model` |
//! | `DATAOPS_LLM_BASE_URL` | `llm.base_url` |
//! | `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` | `llm.api_key` (by provider) |
//! | `DATAOPS_PLATFORM_URL` | `platform.base_url` |
//! | `DATAOPS_ACCESS_TOKEN` | `platform.access_token` |
//! | `DATAOPS_API_KEY` | `platform.api_key` |
//! | `DATAOPS_ORG_ID` | `platform.org_id` |
//! | `DATAOPS_SANDBOX` | `platform.sandbox` |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::llm::{LlmClientConfig, LlmProvider};
use crate::poller::PollerConfig;

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/dataops.toml";

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[llm]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// `anthropic` or `openai` (any OpenAI-compatible endpoint).
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Usually supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            model: None,
            base_url: None,
            api_key: None,
        }
    }
}

/// `[platform]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub org_id: Option<String>,
    pub sandbox: String,
    /// Per-request timeout for platform calls.
    pub request_timeout_secs: u64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            access_token: None,
            api_key: None,
            org_id: None,
            sandbox: "prod".into(),
            request_timeout_secs: 30,
        }
    }
}

/// `[poller]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            timeout_ms: 30_000,
        }
    }
}

/// `[web]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

// ---------------------------------------------------------------------------
// DataOpsConfig
// ---------------------------------------------------------------------------

/// Complete copilot configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataOpsConfig {
    pub llm: LlmSettings,
    pub platform: PlatformSettings,
    pub poller: PollerSettings,
    pub web: WebSettings,
}

impl DataOpsConfig {
    /// Load from `path` and overlay the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Read a TOML file.  A missing file yields defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = ?path, "configuration file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            reason: format!("failed to read config file {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = ?path, "configuration loaded from file");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| AgentError::Config {
            reason: format!("failed to parse TOML config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(env_non_empty);
    }

    /// Overlay values from `lookup`, which returns `None` for unset or empty
    /// variables.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("DATAOPS_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = lookup("DATAOPS_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = lookup("DATAOPS_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        let key_var = match self.llm.provider() {
            Ok(LlmProvider::OpenAI) => "OPENAI_API_KEY",
            _ => "ANTHROPIC_API_KEY",
        };
        if let Some(key) = lookup(key_var) {
            self.llm.api_key = Some(key);
        }

        if let Some(url) = lookup("DATAOPS_PLATFORM_URL") {
            self.platform.base_url = url;
        }
        if let Some(token) = lookup("DATAOPS_ACCESS_TOKEN") {
            self.platform.access_token = Some(token);
        }
        if let Some(key) = lookup("DATAOPS_API_KEY") {
            self.platform.api_key = Some(key);
        }
        if let Some(org) = lookup("DATAOPS_ORG_ID") {
            self.platform.org_id = Some(org);
        }
        if let Some(sandbox) = lookup("DATAOPS_SANDBOX") {
            self.platform.sandbox = sandbox;
        }
    }

    /// Reject settings no component could run with.
    pub fn validate(&self) -> Result<()> {
        self.llm.provider()?;
        if self.poller.poll_interval_ms == 0 {
            return Err(AgentError::Config {
                reason: "poller.poll_interval_ms must be greater than zero".into(),
            });
        }
        if self.poller.timeout_ms < self.poller.poll_interval_ms {
            return Err(AgentError::Config {
                reason: "poller.timeout_ms must not be shorter than poller.poll_interval_ms".into(),
            });
        }
        if self.platform.base_url.trim().is_empty() {
            return Err(AgentError::Config {
                reason: "platform.base_url must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Poller cadence with the default non-terminal states.
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::with_timing(
            Duration::from_millis(self.poller.poll_interval_ms),
            Duration::from_millis(self.poller.timeout_ms),
        )
    }

    /// Client settings for the configured provider.  A missing API key is
    /// not an error; the client then reports itself as unconfigured.
    pub fn llm_client_config(&self) -> Result<LlmClientConfig> {
        let api_key = self.llm.api_key.clone().unwrap_or_default();
        let config = match self.llm.provider()? {
            LlmProvider::Anthropic => {
                let model = self.llm.model.as_deref().unwrap_or(DEFAULT_ANTHROPIC_MODEL);
                let mut config = LlmClientConfig::anthropic(api_key, model);
                if let Some(url) = &self.llm.base_url {
                    config.base_url = url.clone();
                }
                config
            }
            LlmProvider::OpenAI => {
                let model = self.llm.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
                match &self.llm.base_url {
                    Some(url) => LlmClientConfig::openai_compatible(api_key, model, url),
                    None => LlmClientConfig::openai(api_key, model),
                }
            }
        };
        Ok(config)
    }
}

impl LlmSettings {
    pub fn provider(&self) -> Result<LlmProvider> {
        self.provider.parse()
    }
}

/// Read a non-empty environment variable, returning `None` if unset or empty.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
