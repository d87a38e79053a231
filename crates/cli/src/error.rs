//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A query or agent setup failed.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// The model gateway could not be built.
    #[error(transparent)]
    Model(#[from] runtime::ModelError),

    /// The tool provider could not be reached.
    #[error("tool provider: {0}")]
    Tool(#[from] runtime::ToolError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
