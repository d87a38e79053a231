use thiserror::Error;

/// Errors that can occur while talking to a tool provider.
///
/// A tool that runs and reports failure is not an error here; that comes
/// back as a [`ToolResult`](crate::ToolResult) with `is_error` set.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl From<mcp::Error> for ToolError {
    fn from(err: mcp::Error) -> Self {
        if err.is_transport() {
            Self::Transport(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}
