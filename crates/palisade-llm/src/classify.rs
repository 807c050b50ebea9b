//! Failure classification
//!
//! Pure predicates deciding how a provider failure should be treated by
//! the retry engine: retry with cooldown, retry without cooldown, or give
//! up immediately. Classification looks at a status code when one exists
//! and otherwise falls back to case-insensitive message matching, since
//! gateways frequently surface rate limiting as plain text.

use crate::error::Error;
use std::fmt;

/// Retry class of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider rejected the call for quota reasons; retryable and
    /// triggers the stabilization cooldown.
    RateLimited,
    /// Transient server-side failure; retryable, no cooldown.
    TransientServer,
    /// Not retryable; propagated on first occurrence.
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::TransientServer => write!(f, "transient_server"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Message fragments that indicate a rate limit rejection.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "too many requests",
    "quota exceeded",
    "rate_limit_exceeded",
    "requests per minute",
    "requests per hour",
];

/// Message fragments that indicate a transient server failure.
const SERVER_ERROR_MARKERS: &[&str] = &[
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "server error",
    "upstream error",
];

/// HTTP statuses treated as transient server failures.
const SERVER_ERROR_STATUSES: &[u16] = &[500, 502, 503, 504];

/// Returns `true` if the message looks like a rate limit rejection.
#[must_use]
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Returns `true` if the message looks like a transient server failure.
#[must_use]
pub fn is_server_error_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    SERVER_ERROR_MARKERS.iter().any(|m| lower.contains(m))
}

/// Classify a failure from its status code and message.
///
/// Rate limiting wins over server errors when both match. Anything that
/// matches neither is fatal and must not be retried.
#[must_use]
pub fn classify_failure(status: Option<u16>, message: &str) -> ErrorClass {
    if status == Some(429) || is_rate_limit_message(message) {
        return ErrorClass::RateLimited;
    }
    if status.is_some_and(|s| SERVER_ERROR_STATUSES.contains(&s)) || is_server_error_message(message)
    {
        return ErrorClass::TransientServer;
    }
    ErrorClass::Fatal
}

/// Implemented by failure types the retry engine can classify.
///
/// The display form is used for keyword matching, so implementors should
/// keep the original provider message in their `Display` output.
pub trait Classify: fmt::Display {
    /// Status code attached to the failure, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Retry class of this failure.
    fn classify(&self) -> ErrorClass {
        classify_failure(self.status_code(), &self.to_string())
    }
}

impl Classify for Error {
    fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => *status,
            _ => None,
        }
    }
}
