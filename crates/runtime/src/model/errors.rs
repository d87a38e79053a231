use std::time::Duration;

use thiserror::Error;

/// Errors from model service calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The call did not complete in time.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service is throttling us.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider returned an error response.
    #[error("provider api ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The request options are out of range.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}
