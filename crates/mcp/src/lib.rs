//! Remote tool client library.
//!
//! Talks to a "tool host" (a subprocess speaking framed JSON-RPC over
//! stdio, or an HTTP service with equivalent endpoints), performs the
//! handshake, and exposes two operations: list the host's tools and call
//! one by name.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Endpoint, Framing, Session, SessionOptions, StdioConfig, ToolSession};
//! use std::time::Duration;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = StdioConfig::new("npx")
//!     .arg("-y")
//!     .arg("@modelcontextprotocol/server-github")
//!     .env("GITHUB_PERSONAL_ACCESS_TOKEN", "ghp_...")
//!     .framing(Framing::LineDelimited);
//!
//! let session = Session::open(Endpoint::Process(config), SessionOptions::default()).await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let arguments = serde_json::json!({
//!     "owner": "octo",
//!     "repo": "demo",
//!     "branch": "feature",
//!     "from_branch": "main"
//! });
//! let result = session
//!     .call_tool(
//!         "create_branch",
//!         arguments.as_object().cloned().unwrap_or_default(),
//!         Duration::from_secs(30),
//!     )
//!     .await?;
//! println!("{result}");
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Stream framing
//!
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! {"jsonrpc": "2.0", "id": 1, "method": "...", "params": {...}}
//! ```
//!
//! Hosts that write one JSON object per line are supported through
//! [`Framing::LineDelimited`]. Output that is not a frame is logged and
//! skipped.

mod catalog;
mod error;
pub mod framing;
mod http;
mod intent;
mod pending;
mod protocol;
mod session;
mod stdio;

pub use catalog::parse_tool_list;
pub use error::{Error, Result};
pub use framing::{Frame, FrameDecoder, Framing, MAX_FRAME_SIZE};
pub use http::{CALL_PATH, CAPABILITY_PATHS, HttpConfig, HttpSession, TOOL_LIST_PATHS};
pub use intent::{Intent, IntentResolver};
pub use pending::{Delivery, PendingTable};
pub use protocol::{
    CallToolParams, Capabilities, Inbound, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Outcome, PROTOCOL_VERSION, RequestId,
    ServerInfo, ToolDescriptor,
};
pub use session::{DEFAULT_TIMEOUT, Endpoint, Session, SessionOptions, ToolSession};
pub use stdio::{StdioConfig, StdioSession};
