//! Transport-agnostic session surface.

use std::future::Future;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::http::{HttpConfig, HttpSession};
use crate::protocol::{Capabilities, ToolDescriptor};
use crate::stdio::{StdioConfig, StdioSession};

/// Default timeout for handshakes, listings, and calls without their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the tool host lives.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Spawned subprocess speaking frames over stdin/stdout.
    Process(StdioConfig),
    /// HTTP service exposing capability, list, and call endpoints.
    Http(HttpConfig),
}

/// Per-session settings, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bearer token for the HTTP transport.
    pub token: Option<String>,
    pub timeout: Duration,
    /// Announced to the host during the handshake.
    pub client_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            token: None,
            timeout: DEFAULT_TIMEOUT,
            client_name: "mcpctl".to_string(),
        }
    }
}

impl SessionOptions {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Operations every tool host session offers.
///
/// At most one handshake happens per session and it happens while the
/// session is being opened, so any value implementing this trait is ready
/// for calls.
pub trait ToolSession: Send + Sync {
    /// Capability set declared by the host during the handshake.
    fn capabilities(&self) -> &Capabilities;

    /// Enumerate the host's tools. An empty catalog is a valid answer.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<ToolDescriptor>>> + Send;

    /// Invoke a named tool, waiting at most `timeout` for the result.
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Best-effort teardown. Idempotent.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// A session over either transport.
pub enum Session {
    Stdio(StdioSession),
    Http(HttpSession),
}

impl Session {
    /// Start the transport and perform the handshake.
    pub async fn open(endpoint: Endpoint, options: SessionOptions) -> Result<Self> {
        match endpoint {
            Endpoint::Process(config) => {
                Ok(Self::Stdio(StdioSession::spawn(config, &options).await?))
            }
            Endpoint::Http(config) => Ok(Self::Http(HttpSession::open(config, &options).await?)),
        }
    }
}

impl ToolSession for Session {
    fn capabilities(&self) -> &Capabilities {
        match self {
            Self::Stdio(s) => s.capabilities(),
            Self::Http(s) => s.capabilities(),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        match self {
            Self::Stdio(s) => s.list_tools().await,
            Self::Http(s) => s.list_tools().await,
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        match self {
            Self::Stdio(s) => s.call_tool(name, arguments, timeout).await,
            Self::Http(s) => s.call_tool(name, arguments, timeout).await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Stdio(s) => s.close().await,
            Self::Http(s) => s.close().await,
        }
    }
}
