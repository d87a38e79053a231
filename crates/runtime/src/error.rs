use thiserror::Error;

use crate::model::ModelError;

/// Why a query failed.
///
/// Every variant aborts the query it came from; none is retried inside the
/// runtime. `round` is the 1-based model round trip the failure happened in.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("transport error{} in round {round}: {message}", tool_suffix(.tool))]
    Transport {
        tool: Option<String>,
        round: usize,
        message: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("model service error in round {round}: {source}")]
    ModelService {
        round: usize,
        #[source]
        source: ModelError,
    },

    #[error("model requested unknown tool '{name}' in round {round}")]
    UnknownTool { name: String, round: usize },

    #[error("no final answer after {limit} model round trips")]
    IterationLimitExceeded { limit: usize },

    #[error("query cancelled")]
    Cancelled,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("config error: {0}")]
    Config(String),
}

fn tool_suffix(tool: &Option<String>) -> String {
    tool.as_ref()
        .map(|name| format!(" calling '{name}'"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
