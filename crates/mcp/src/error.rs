//! MCP error types.

use std::time::Duration;

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Errors produced by a provider session.
///
/// Variants fall into two classes, see [`Error::is_transport`]: the channel
/// itself failed, or the provider answered with something we cannot use.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to spawn provider: {0}")]
    Spawn(std::io::Error),

    #[error("channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("provider exited unexpectedly")]
    ServerExited,

    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),

    #[error("channel torn by an interrupted or oversized frame; reconnect the session")]
    ChannelTorn,

    #[error("session closed")]
    Closed,

    #[error("frame too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },

    #[error("failed to encode or decode payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("invalid server config: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure lies in the channel rather than in the payload.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Spawn(_)
                | Self::Io(_)
                | Self::ServerExited
                | Self::Timeout(..)
                | Self::ChannelTorn
                | Self::Closed
                | Self::OutputTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
