//! Error and retry-policy types for LLM provider calls.
//!
//! [`LlmError`] is the single error type crossing the provider port. Every
//! variant can produce a [`RetryPolicy`], which is the only input the retry
//! executor uses to decide whether to re-issue a request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed provider-side cause preserved behind an [`LlmError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: rate limiting, connection failures, timeouts.
/// - `NonRetryable` errors: everything else (authentication, invalid request,
///   server errors, malformed responses, configuration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Errors produced by an LLM completion, streaming, or embedding call.
///
/// Only [`LlmError::RateLimited`], [`LlmError::ConnectionFailed`] and
/// [`LlmError::TimedOut`] are transient. Where the failure originated in the
/// HTTP client or provider SDK, the original error is kept as the `source`.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider rejected the call because a rate limit was hit (HTTP 429).
    #[error("Rate limited by provider: {message}")]
    RateLimited {
        /// Provider-supplied description.
        message: String,
        /// Delay requested by the provider, if it sent one.
        retry_after: Option<Duration>,
    },

    /// The connection to the provider could not be established or was lost
    /// before a response arrived.
    #[error("Connection to provider failed: {message}")]
    ConnectionFailed {
        /// Human-readable description.
        message: String,
        /// Underlying transport error.
        #[source]
        source: Option<BoxError>,
    },

    /// The provider did not answer within the configured timeout.
    #[error("Provider call timed out: {message}")]
    TimedOut {
        /// Human-readable description.
        message: String,
        /// Underlying transport error.
        #[source]
        source: Option<BoxError>,
    },

    /// The credentials were missing, invalid, or lack permission (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Provider-supplied description.
        message: String,
    },

    /// The request was rejected as invalid (HTTP 400/404/422), or could not be
    /// built at all (e.g. no messages).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// Any other non-success status reported by the provider.
    #[error("Provider error (status {status}): {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Provider-supplied description.
        message: String,
    },

    /// The provider answered, but the body could not be interpreted.
    #[error("Malformed provider response: {message}")]
    MalformedResponse {
        /// Description of what was wrong with the body.
        message: String,
        /// Underlying decode error.
        #[source]
        source: Option<BoxError>,
    },

    /// The provider or dispatcher configuration is unusable.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}

impl LlmError {
    /// Creates a [`LlmError::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a [`LlmError::ConfigurationError`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Creates a [`LlmError::MalformedResponse`] with an optional cause.
    pub fn malformed(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            source,
        }
    }

    /// Classifies this error for the retry executor.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RateLimited { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::ConnectionFailed { .. } | Self::TimedOut { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Authentication { .. }
            | Self::InvalidRequest { .. }
            | Self::Provider { .. }
            | Self::MalformedResponse { .. }
            | Self::ConfigurationError { .. } => RetryPolicy::NonRetryable,
        }
    }

    /// Returns `true` if this error is one of the three transient kinds.
    pub fn is_transient(&self) -> bool {
        self.retry_policy().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        let limited = LlmError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(
            limited.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(7))
            }
        );

        let conn = LlmError::ConnectionFailed {
            message: "refused".into(),
            source: None,
        };
        assert!(conn.is_transient());

        let timeout = LlmError::TimedOut {
            message: "120s".into(),
            source: None,
        };
        assert!(timeout.is_transient());
    }

    #[test]
    fn everything_else_is_not_retryable() {
        let errors = [
            LlmError::Authentication {
                message: "bad key".into(),
            },
            LlmError::invalid_request("no messages"),
            LlmError::Provider {
                status: 500,
                message: "boom".into(),
            },
            LlmError::malformed("not json", None),
            LlmError::configuration("missing endpoint"),
        ];
        for err in errors {
            assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable, "{err}");
        }
    }

    #[test]
    fn source_is_preserved() {
        let cause: BoxError = "socket closed".into();
        let err = LlmError::ConnectionFailed {
            message: "send failed".into(),
            source: Some(cause),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("socket closed"));
    }
}
