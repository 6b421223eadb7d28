//! Tool client error types.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The host could not be spawned or reached, or the handshake failed.
    #[error("failed to start tool host: {0}")]
    TransportStartup(String),

    /// A structured message was required but the host sent something else.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The host answered with an explicit error payload.
    #[error("remote tool error: {0}")]
    RemoteTool(Value),

    #[error("no response to '{method}' within {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    /// The session was closed or the host went away.
    #[error("channel to tool host is closed")]
    ChannelClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the host-reported payload for [`Error::RemoteTool`].
    pub fn remote_payload(&self) -> Option<&Value> {
        match self {
            Error::RemoteTool(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
