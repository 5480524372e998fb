// Error types for the gateway pipeline

use conflux_abstraction::{PlatformError, QueryPriority};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// One failed (or skipped) attempt during failover, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    /// The platform that was tried or skipped.
    pub platform: String,
    /// Human-readable failure reason.
    pub reason: String,
    /// Whether the failure class allowed advancing to the next candidate.
    pub retryable: bool,
}

impl AttemptFailure {
    /// Creates an attempt record from a platform error.
    #[must_use]
    pub fn from_error(platform: impl Into<String>, error: &PlatformError) -> Self {
        Self {
            platform: platform.into(),
            reason: error.to_string(),
            retryable: error.is_retryable(),
        }
    }

    /// Creates an attempt record for a platform skipped without a call.
    #[must_use]
    pub fn skipped(platform: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { platform: platform.into(), reason: reason.into(), retryable: true }
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.platform, self.reason)
    }
}

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound request failed structural/semantic validation
    #[error("invalid request: {0}")]
    Validation(String),

    /// Admission was denied for the request's priority class
    #[error("rate limit exceeded for priority '{priority}'")]
    RateLimitExceeded {
        /// The priority class that was denied
        priority: QueryPriority,
    },

    /// No platforms are registered; the gateway cannot route anything
    #[error("no platforms registered")]
    NoPlatformsRegistered,

    /// Every candidate platform failed; carries per-attempt diagnostics
    #[error("all platforms failed after {} attempts", .0.len())]
    AllPlatformsFailed(Vec<AttemptFailure>),

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// A platform failed with a non-retryable error, stopping failover
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Gateway wiring/configuration problem
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cache backend failure; never aborts a request, logged only
    #[error("cache error: {0}")]
    Cache(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_failure_from_error() {
        let error = PlatformError::Timeout { platform: "doc-search".to_string() };
        let attempt = AttemptFailure::from_error("doc-search", &error);
        assert_eq!(attempt.platform, "doc-search");
        assert!(attempt.retryable);
        assert!(attempt.reason.contains("timed out"));
    }

    #[test]
    fn test_all_platforms_failed_display() {
        let err = GatewayError::AllPlatformsFailed(vec![
            AttemptFailure::skipped("a", "circuit open"),
            AttemptFailure::skipped("b", "window full"),
        ]);
        assert_eq!(err.to_string(), "all platforms failed after 2 attempts");
    }
}
