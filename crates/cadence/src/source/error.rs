//! Retrieval error types for the event source.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while retrieving events from the source API.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The API answered with a non-success status.
    #[error("Unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// The API rejected the request because the quota is exhausted.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Rate-limit metadata was present but could not be parsed.
    #[error("Malformed rate limit header {header}: {value:?}")]
    MalformedRateLimit { header: &'static str, value: String },

    /// The response body was not a list of events.
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A page fetch task failed to complete.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SourceError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Transport failures, 5xx responses and quota exhaustion are transient.
    /// Other 4xx statuses and malformed payloads are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::MalformedRateLimit { .. } | Self::Decode { .. } | Self::Internal(_) => false,
        }
    }
}

/// Extract a short error message suitable for log fields.
///
/// Takes the first line of the error's display output.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let transport = SourceError::Transport {
            url: "u".to_string(),
            message: "reset".to_string(),
        };
        assert!(transport.is_transient());

        let server = SourceError::Status {
            status: 502,
            url: "u".to_string(),
        };
        assert!(server.is_transient());

        let not_found = SourceError::Status {
            status: 404,
            url: "u".to_string(),
        };
        assert!(!not_found.is_transient());

        let limited = SourceError::RateLimited {
            reset_at: Utc::now(),
        };
        assert!(limited.is_transient());

        let malformed = SourceError::MalformedRateLimit {
            header: "x-ratelimit-remaining",
            value: "lots".to_string(),
        };
        assert!(!malformed.is_transient());
    }

    #[test]
    fn short_error_message_takes_first_line() {
        let err = SourceError::Decode {
            url: "https://api.github.com/repos/a/b/events".to_string(),
            message: "expected value\nat line 1".to_string(),
        };
        assert_eq!(
            short_error_message(&err),
            "Failed to decode response from https://api.github.com/repos/a/b/events: expected value"
        );
    }

    #[test]
    fn status_error_mentions_url_and_code() {
        let err = SourceError::Status {
            status: 404,
            url: "https://api.github.com/repos/a/b/events?page=1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("/repos/a/b/events"));
    }
}
