//! Configuration for a3s-agent-stream
//!
//! Agent identity and transport settings. Loaded from a JSON file, from
//! `A3S_AGENT_*` environment variables, or built programmatically, then
//! checked with [`AgentConfig::validate`] before any session is created.

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the agent id
pub const ENV_AGENT_ID: &str = "A3S_AGENT_ID";
/// Environment variable holding the agent alias id
pub const ENV_AGENT_ALIAS_ID: &str = "A3S_AGENT_ALIAS_ID";
/// Environment variable holding the region
pub const ENV_AGENT_REGION: &str = "A3S_AGENT_REGION";
/// Environment variable holding the gateway endpoint
pub const ENV_AGENT_ENDPOINT: &str = "A3S_AGENT_ENDPOINT";
/// Environment variable holding the gateway bearer token
pub const ENV_AGENT_TOKEN: &str = "A3S_AGENT_TOKEN";

/// Agent invocation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Remote agent id (required)
    #[serde(default)]
    pub agent_id: String,

    /// Remote agent alias id (required)
    #[serde(default)]
    pub agent_alias_id: String,

    /// Runtime region
    #[serde(default = "default_region")]
    pub region: String,

    /// Transport settings
    #[serde(default)]
    pub transport: HttpTransportConfig,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            agent_alias_id: String::new(),
            region: default_region(),
            transport: HttpTransportConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Create a config for the given agent and alias
    pub fn new(agent_id: impl Into<String>, agent_alias_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_alias_id: agent_alias_id.into(),
            ..Default::default()
        }
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the gateway endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.transport.endpoint = Some(endpoint.into());
        self
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: AgentConfig = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Load from `A3S_AGENT_*` environment variables
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Override fields with any `A3S_AGENT_*` variables that are set
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var(ENV_AGENT_ID) {
            self.agent_id = v;
        }
        if let Some(v) = var(ENV_AGENT_ALIAS_ID) {
            self.agent_alias_id = v;
        }
        if let Some(v) = var(ENV_AGENT_REGION) {
            self.region = v;
        }
        if let Some(v) = var(ENV_AGENT_ENDPOINT) {
            self.transport.endpoint = Some(v);
        }
        if let Some(v) = var(ENV_AGENT_TOKEN) {
            self.transport.token = Some(v);
        }
        self
    }

    /// Fail fast on missing required settings
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(StreamError::Config(format!(
                "agentId is not set (config file or {})",
                ENV_AGENT_ID
            )));
        }
        if self.agent_alias_id.trim().is_empty() {
            return Err(StreamError::Config(format!(
                "agentAliasId is not set (config file or {})",
                ENV_AGENT_ALIAS_ID
            )));
        }
        if self.region.trim().is_empty() {
            return Err(StreamError::Config("region cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTransportConfig {
    /// Gateway base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bearer token for the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}
