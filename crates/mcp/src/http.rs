//! HTTP transport: a tool host behind a small REST surface.
//!
//! Read endpoints are probed against ordered candidate paths; the first
//! that answers successfully wins. Invocation always uses [`CALL_PATH`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::parse_tool_list;
use crate::error::{Error, Result};
use crate::protocol::{CallToolParams, Capabilities, ToolDescriptor};
use crate::session::{SessionOptions, ToolSession};

/// Capability endpoints, in order of precedence.
pub const CAPABILITY_PATHS: &[&str] = &["/capabilities", "/v1/capabilities", "/mcp/capabilities"];

/// Tool catalog endpoints, in order of precedence.
pub const TOOL_LIST_PATHS: &[&str] = &["/tools/list", "/v1/tools/list", "/mcp/tools/list"];

/// The only invocation endpoint; never probed.
pub const CALL_PATH: &str = "/tools/call";

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Session with an HTTP tool host.
pub struct HttpSession {
    client: reqwest::Client,
    base_url: String,
    capabilities: Capabilities,
    capability_path: &'static str,
    timeout: Duration,
    closed: AtomicBool,
}

impl HttpSession {
    /// Bind the client and fetch the host's capabilities.
    pub async fn open(config: HttpConfig, options: &SessionOptions) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        if let Some(token) = &options.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::TransportStartup(format!("invalid token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("{}/{}", options.client_name, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::TransportStartup(format!("failed to build HTTP client: {e}")))?;

        let (capability_path, body) =
            get_first_ok(&client, &base_url, CAPABILITY_PATHS, options.timeout)
                .await
                .map_err(|e| {
                    Error::TransportStartup(format!(
                        "no capability endpoint answered at {base_url}: {e}"
                    ))
                })?;
        debug!(%base_url, path = capability_path, "tool host reachable");

        Ok(Self {
            client,
            base_url,
            capabilities: Capabilities::new(body),
            capability_path,
            timeout: options.timeout,
            closed: AtomicBool::new(false),
        })
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The candidate path that answered the capability probe.
    pub fn capability_path(&self) -> &'static str {
        self.capability_path
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Enumerate tools, falling back to tools embedded in the capabilities
    /// when no list endpoint exists.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_open()?;
        match get_first_ok(&self.client, &self.base_url, TOOL_LIST_PATHS, self.timeout).await {
            Ok((_, body)) => parse_tool_list(&body),
            Err(e @ Error::Protocol(_)) => Err(e),
            Err(e) => match self.capabilities.tools() {
                Some(tools) => {
                    debug!(error = %e, "no tool list endpoint, using capability tools");
                    parse_tool_list(&Value::Array(tools.clone()))
                }
                None => Err(e),
            },
        }
    }

    /// POST `{name, arguments}` to the invocation endpoint.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.ensure_open()?;
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let response = self
            .client
            .post(format!("{}{CALL_PATH}", self.base_url))
            .json(&params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| call_error(e, timeout))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| call_error(e, timeout))?;
        let body = serde_json::from_slice::<Value>(&bytes);

        if !status.is_success() {
            let payload = body
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
            debug!(tool = name, %status, "tool call rejected");
            return Err(Error::RemoteTool(payload));
        }

        let body =
            body.map_err(|e| Error::Protocol(format!("tool call returned invalid JSON: {e}")))?;
        match body.get("error") {
            Some(error) if !error.is_null() => Err(Error::RemoteTool(error.clone())),
            _ if body.get("isError").and_then(Value::as_bool) == Some(true) => {
                Err(Error::RemoteTool(body))
            }
            _ => Ok(body),
        }
    }

    /// Nothing to tear down beyond refusing further calls.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ChannelClosed);
        }
        Ok(())
    }
}

impl ToolSession for HttpSession {
    fn capabilities(&self) -> &Capabilities {
        HttpSession::capabilities(self)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        HttpSession::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        HttpSession::call_tool(self, name, arguments, timeout).await
    }

    async fn close(&self) {
        HttpSession::close(self).await
    }
}

fn call_error(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            method: CALL_PATH.to_string(),
            timeout,
        }
    } else {
        Error::Http(e)
    }
}

/// GET each candidate in order until one answers.
///
/// Unreachable paths and error statuses move on to the next candidate; a
/// success status with an undecodable body stops the probe.
async fn get_first_ok(
    client: &reqwest::Client,
    base_url: &str,
    paths: &[&'static str],
    timeout: Duration,
) -> Result<(&'static str, Value)> {
    let mut last_error = None;
    for &path in paths {
        match get_json(client, base_url, path, timeout).await {
            Ok(body) => return Ok((path, body)),
            Err(e @ Error::Protocol(_)) => return Err(e),
            Err(e) => {
                debug!(path, error = %e, "candidate path failed");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::Protocol("no candidate paths".to_string())))
}

async fn get_json(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    timeout: Duration,
) -> Result<Value> {
    let response = client
        .get(format!("{base_url}{path}"))
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Protocol(format!("{path} returned invalid JSON: {e}")))
}
