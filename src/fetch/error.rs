//! Fetch error types
//!
//! Every failure a poller can surface, with a technical `Display` for logs
//! and a short `user_message` for the dashboard.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP status used by rate-limited endpoints
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Errors that can occur while fetching remote records
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    /// Rate limited; the fetch is still being retried
    #[error("Rate limited (attempt {attempt})")]
    RateLimited { attempt: u32 },

    /// Rate limited on every attempt; gave up until the next poll
    #[error("Rate limited on {attempts} consecutive attempts")]
    Exhausted { attempts: u32 },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its timeout
    #[error("Request timeout")]
    Timeout,

    /// Non-success HTTP status other than 429
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Payload did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// The endpoint answered with an error payload
    #[error("Remote error: {0}")]
    Remote(String),
}

impl FetchError {
    /// Build an error from a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == TOO_MANY_REQUESTS {
            FetchError::RateLimited { attempt: 0 }
        } else {
            FetchError::Api {
                status,
                message: message.into(),
            }
        }
    }

    /// Whether this failure should be retried with backoff
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }

    /// Whether the poller is still working on this fetch
    pub fn is_transient(&self) -> bool {
        self.is_rate_limit()
    }

    /// Short, non-technical message for display
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::RateLimited { .. } => "Rate limited. Retrying shortly...",
            FetchError::Exhausted { .. } => "Too many requests. Please try again later.",
            FetchError::Network(_) => "Network error. Check your connection.",
            FetchError::Timeout => "The server took too long to respond.",
            FetchError::Api { .. } => "The data service returned an error.",
            FetchError::Decode(_) => "Received unexpected data from the server.",
            FetchError::Remote(_) => "The data service could not answer this query.",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::from_status(status.as_u16(), e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

/// Result type alias for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(FetchError::from_status(429, "slow down").is_rate_limit());
        let err = FetchError::from_status(500, "boom");
        assert!(!err.is_rate_limit());
        assert_eq!(err.to_string(), "API error 500: boom");
    }

    #[test]
    fn test_user_messages_hide_detail() {
        let err = FetchError::Network("tcp connect error: 10.0.0.1:443".into());
        assert!(!err.user_message().contains("10.0.0.1"));
        assert!(err.to_string().contains("10.0.0.1"));
        assert_eq!(
            FetchError::Exhausted { attempts: 3 }.user_message(),
            "Too many requests. Please try again later."
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let err: FetchError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
