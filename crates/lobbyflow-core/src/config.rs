use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LobbyflowError, Result};

/// Top-level Lobbyflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// REST backend used for notifications, form lookups and execution persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub server_url: String,
    /// Device token sent as `X-Device-Token`.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            auth_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How often a single node may be reached in one run before it fails.
    #[serde(default = "default_max_node_visits")]
    pub max_node_visits: usize,
    /// Persist each execution record once its run ends.
    #[serde(default = "default_save_executions")]
    pub save_executions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_node_visits: default_max_node_visits(),
            save_executions: default_save_executions(),
        }
    }
}

fn default_timeout_secs() -> u64 { 30 }
fn default_max_node_visits() -> usize { 5 }
fn default_save_executions() -> bool { true }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| LobbyflowError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| LobbyflowError::Config(e.to_string()))?;

        if let Some(backend) = &config.backend {
            if backend.server_url.trim().is_empty() {
                return Err(LobbyflowError::Config("backend.server_url is empty".into()));
            }
        }
        if config.engine.max_node_visits == 0 {
            return Err(LobbyflowError::Config(
                "engine.max_node_visits must be at least 1".into(),
            ));
        }

        Ok(config)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Unset variables stay as written.
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
