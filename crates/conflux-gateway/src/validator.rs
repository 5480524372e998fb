//! Inbound request validation.

use crate::error::{GatewayError, Result};
use conflux_abstraction::{QueryPriority, UnifiedQueryRequest};
use regex::Regex;
use tracing::debug;

/// Maximum query length in characters.
const MAX_QUERY_CHARS: usize = 2000;
/// Maximum number of context snippets.
const MAX_CONTEXT_SNIPPETS: usize = 100;

/// Stateless validator for inbound unified requests.
///
/// Rejections are final: callers are expected not to retry a rejected
/// request unchanged.
#[derive(Debug)]
pub struct RequestValidator {
    /// Characters treated as injection risk for critical-priority queries.
    injection_screen: Regex,
}

impl RequestValidator {
    /// Creates a validator with the default bounds.
    #[must_use]
    pub fn new() -> Self {
        // The character class is fixed; compilation cannot fail.
        let injection_screen =
            Regex::new(r#"["'<>]"#).expect("injection screen regex is valid");
        Self { injection_screen }
    }

    /// Validates a request, returning a human-readable reason on rejection.
    ///
    /// # Errors
    /// Returns `GatewayError::Validation` describing the first violation.
    pub fn validate(&self, request: &UnifiedQueryRequest) -> Result<()> {
        if request.query.trim().is_empty() {
            return Err(GatewayError::Validation("query must not be empty".to_string()));
        }

        let chars = request.query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(GatewayError::Validation(format!(
                "query length {} exceeds the {} character limit",
                chars, MAX_QUERY_CHARS
            )));
        }

        if request.context.len() > MAX_CONTEXT_SNIPPETS {
            return Err(GatewayError::Validation(format!(
                "context holds {} snippets, limit is {}",
                request.context.len(),
                MAX_CONTEXT_SNIPPETS
            )));
        }

        if request.priority == QueryPriority::Critical
            && self.injection_screen.is_match(&request.query)
        {
            debug!(priority = %request.priority, "Rejected critical query with flagged characters");
            return Err(GatewayError::Validation(
                "critical-priority queries must not contain quote or angle-bracket characters"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_request() {
        let validator = RequestValidator::new();
        let request = UnifiedQueryRequest::new("explain our data retention policy");
        assert!(validator.validate(&request).is_ok());
    }

    #[test]
    fn test_rejects_empty_query() {
        let validator = RequestValidator::new();
        assert!(validator.validate(&UnifiedQueryRequest::new("")).is_err());
        assert!(validator.validate(&UnifiedQueryRequest::new("   ")).is_err());
    }

    #[test]
    fn test_rejects_oversized_query() {
        let validator = RequestValidator::new();
        let request = UnifiedQueryRequest::new("x".repeat(MAX_QUERY_CHARS + 1));
        let err = validator.validate(&request).unwrap_err();
        assert!(err.to_string().contains("character limit"));
    }

    #[test]
    fn test_rejects_oversized_context() {
        let validator = RequestValidator::new();
        let request = UnifiedQueryRequest::new("q")
            .with_context(vec!["c".to_string(); MAX_CONTEXT_SNIPPETS + 1]);
        assert!(validator.validate(&request).is_err());
    }

    #[test]
    fn test_critical_injection_screen() {
        let validator = RequestValidator::new();

        let flagged = UnifiedQueryRequest::new(r#"drop "table" now"#)
            .with_priority(QueryPriority::Critical);
        assert!(validator.validate(&flagged).is_err());

        // Same query is fine at normal priority.
        let normal = UnifiedQueryRequest::new(r#"drop "table" now"#);
        assert!(validator.validate(&normal).is_ok());

        let clean =
            UnifiedQueryRequest::new("status of order 42").with_priority(QueryPriority::Critical);
        assert!(validator.validate(&clean).is_ok());
    }
}
