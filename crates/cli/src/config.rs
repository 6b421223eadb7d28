//! Configuration loading from mcpctl.toml.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use mcp::{Endpoint, Framing, HttpConfig, IntentResolver, SessionOptions, StdioConfig};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// How to reach the tool host.
    #[serde(default)]
    pub host: HostConfig,

    /// Exact tool names per logical operation, tried before keyword matching.
    #[serde(default)]
    pub aliases: IntentResolver,
}

/// Tool host configuration.
#[derive(Debug, Deserialize)]
pub struct HostConfig {
    /// Explicit transport. Inferred from `command`/`url` when absent.
    pub transport: Option<Transport>,

    /// Program to spawn for the stdio transport.
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the spawned host.
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub framing: Framing,

    /// Base URL for the HTTP transport.
    pub url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_client_name")]
    pub client_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            transport: None,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            framing: Framing::default(),
            url: None,
            timeout_secs: default_timeout_secs(),
            client_name: default_client_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_client_name() -> String {
    "mcpctl".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build the endpoint the session should open.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let host = &self.host;
        let transport = match (host.transport, &host.command, &host.url) {
            (Some(transport), _, _) => transport,
            (None, Some(_), None) => Transport::Stdio,
            (None, None, Some(_)) => Transport::Http,
            (None, Some(_), Some(_)) => return Err(ConfigError::AmbiguousTransport),
            (None, None, None) => return Err(ConfigError::MissingHost),
        };

        match transport {
            Transport::Stdio => {
                let command = host.command.clone().ok_or(ConfigError::MissingCommand)?;
                Ok(Endpoint::Process(StdioConfig {
                    command,
                    args: host.args.clone(),
                    env: host.env.clone(),
                    framing: host.framing,
                }))
            }
            Transport::Http => {
                let url = host.url.clone().ok_or(ConfigError::MissingUrl)?;
                Ok(Endpoint::Http(HttpConfig::new(url)))
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.host.timeout_secs)
    }

    /// Session options; the token comes from the command line or environment.
    pub fn session_options(&self, token: Option<String>) -> SessionOptions {
        SessionOptions {
            token,
            timeout: self.timeout(),
            client_name: self.host.client_name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("no tool host configured: set host.command or host.url (or pass --command / --url)")]
    MissingHost,

    #[error("stdio transport needs host.command")]
    MissingCommand,

    #[error("http transport needs host.url")]
    MissingUrl,

    #[error("ambiguous tool host: both host.command and host.url are set; set host.transport")]
    AmbiguousTransport,
}
