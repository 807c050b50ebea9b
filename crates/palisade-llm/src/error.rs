//! Error types for provider-facing calls

use thiserror::Error;

/// Failure surfaced by a unit of work against an upstream provider.
///
/// The display form preserves the provider message verbatim so keyword
/// classification can operate on `to_string()`.
#[derive(Debug, Error)]
pub enum Error {
    /// API error with an optional HTTP-like status code
    #[error("api error: {message}")]
    Api {
        /// Status code reported by the provider, if any
        status: Option<u16>,
        /// Provider message, preserved verbatim
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Build an API error from a status code and message.
    pub fn api(status: impl Into<Option<u16>>, message: impl Into<String>) -> Self {
        Self::Api {
            status: status.into(),
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
