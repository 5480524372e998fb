//! Platform abstraction layer for Conflux.
//!
//! This crate defines the adapter contract every backend execution platform
//! implements, together with the unified request/response model the gateway
//! exposes to callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Priority class of a unified query.
///
/// Priorities govern admission control and the SLA targets used when scoring
/// platforms: `Critical` > `High` > `Normal` > `Batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPriority {
    /// Latency-critical interactive queries.
    Critical,
    /// High-priority interactive queries.
    High,
    /// Standard priority (the default).
    Normal,
    /// Bulk/background processing.
    Batch,
}

impl QueryPriority {
    /// All priority classes, highest first.
    pub const ALL: [QueryPriority; 4] = [
        QueryPriority::Critical,
        QueryPriority::High,
        QueryPriority::Normal,
        QueryPriority::Batch,
    ];

    /// Parses a priority from its lowercase string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" => Some(QueryPriority::Critical),
            "high" => Some(QueryPriority::High),
            "normal" => Some(QueryPriority::Normal),
            "batch" => Some(QueryPriority::Batch),
            _ => None,
        }
    }
}

impl Default for QueryPriority {
    fn default() -> Self {
        QueryPriority::Normal
    }
}

impl std::fmt::Display for QueryPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryPriority::Critical => write!(f, "critical"),
            QueryPriority::High => write!(f, "high"),
            QueryPriority::Normal => write!(f, "normal"),
            QueryPriority::Batch => write!(f, "batch"),
        }
    }
}

/// Desired shape of the answer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Structured (JSON-like) answer.
    Structured,
    /// Incremental streaming answer.
    Streaming,
    /// Plain text answer.
    Text,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::Text
    }
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseFormat::Structured => write!(f, "structured"),
            ResponseFormat::Streaming => write!(f, "streaming"),
            ResponseFormat::Text => write!(f, "text"),
        }
    }
}

/// A uniform "answer this query" request, independent of which platform
/// ends up serving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedQueryRequest {
    /// The query text (1-2000 characters).
    pub query: String,
    /// Optional explicit platform preference; a registered preference is
    /// always ranked first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_preference: Option<String>,
    /// Ordered context snippets accompanying the query.
    #[serde(default)]
    pub context: Vec<String>,
    /// Priority class for admission and SLA scoring.
    #[serde(default)]
    pub priority: QueryPriority,
    /// Desired answer shape.
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Answer language hint (BCP 47-ish tag, e.g. "en").
    #[serde(default = "default_language")]
    pub language: String,
    /// Free-form caller metadata, passed through to adapters.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Optional caller-supplied tracking id, echoed in diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl UnifiedQueryRequest {
    /// Creates a request with defaults (normal priority, text format, "en").
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            platform_preference: None,
            context: Vec::new(),
            priority: QueryPriority::default(),
            response_format: ResponseFormat::default(),
            language: default_language(),
            metadata: HashMap::new(),
            tracking_id: None,
        }
    }

    /// Sets the priority class.
    #[must_use]
    pub fn with_priority(mut self, priority: QueryPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets an explicit platform preference.
    #[must_use]
    pub fn with_preference(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_preference = Some(platform_id.into());
        self
    }

    /// Sets the context snippets.
    #[must_use]
    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    /// Sets the answer language hint.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the desired answer shape.
    #[must_use]
    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// Sets a caller-supplied tracking id.
    #[must_use]
    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }
}

/// A source citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCitation {
    /// Source title or document name.
    pub title: String,
    /// Relevant excerpt from the source.
    pub snippet: String,
    /// Relevance score in [0, 1].
    pub score: f64,
    /// Optional source locator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Raw result produced by a platform adapter, before the gateway
/// normalizes it into a [`UnifiedQueryResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformReply {
    /// The answer text.
    pub answer: String,
    /// The platform's confidence in the answer, in [0, 1].
    pub confidence: f64,
    /// Source citations backing the answer (possibly empty).
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    /// Suggested follow-up actions (possibly empty).
    #[serde(default)]
    pub next_actions: Vec<String>,
    /// Platform-specific metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PlatformReply {
    /// Creates a reply with the given answer and no sources or actions.
    #[must_use]
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            confidence: 0.0,
            sources: Vec::new(),
            next_actions: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Sets the confidence score (clamped to [0, 1]).
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Sets the source citations.
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }

    /// Sets the suggested follow-up actions.
    #[must_use]
    pub fn with_next_actions(mut self, actions: Vec<String>) -> Self {
        self.next_actions = actions;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// The normalized response returned to callers regardless of which
/// platform served the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedQueryResponse {
    /// Unique id assigned to this request by the gateway.
    pub request_id: String,
    /// The original query text, echoed back.
    pub query: String,
    /// The answer text; on failure, a human-readable explanation.
    pub answer: String,
    /// Identifier of the platform that produced the answer.
    pub platform_used: String,
    /// Confidence in [0, 1].
    pub confidence_score: f64,
    /// Source citations (possibly empty).
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    /// Total processing latency in milliseconds.
    pub processing_time_ms: u64,
    /// Structured metadata (failover diagnostics, error details, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Suggested follow-up actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
    /// Whether this response was served from the cache.
    #[serde(default)]
    pub cache_hit: bool,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Error returned by a platform adapter.
///
/// `Timeout`, `Unavailable`, and `RateLimited` are retryable: failover may
/// advance to the next candidate. `Rejected` and `Serialization` stop the
/// failover chain.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlatformError {
    /// The platform did not answer within the allotted deadline.
    #[error("platform '{platform}' timed out")]
    Timeout {
        /// The platform that timed out.
        platform: String,
    },

    /// The platform is unreachable or returned a server-side failure.
    #[error("platform '{platform}' unavailable: {message}")]
    Unavailable {
        /// The platform that failed.
        platform: String,
        /// Failure detail.
        message: String,
    },

    /// The platform throttled the request.
    #[error("platform '{platform}' rate limited the request")]
    RateLimited {
        /// The platform that throttled.
        platform: String,
    },

    /// The platform rejected the request as malformed for it.
    #[error("platform '{platform}' rejected the request: {reason}")]
    Rejected {
        /// The platform that rejected.
        platform: String,
        /// Rejection reason.
        reason: String,
    },

    /// The platform's response could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The platform kind or configuration is not supported.
    #[error("unsupported platform configuration: {0}")]
    Unsupported(String),
}

impl PlatformError {
    /// Whether failover may advance to the next candidate after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::Timeout { .. }
                | PlatformError::Unavailable { .. }
                | PlatformError::RateLimited { .. }
        )
    }

    /// The platform this error originated from, if known.
    #[must_use]
    pub fn platform(&self) -> Option<&str> {
        match self {
            PlatformError::Timeout { platform }
            | PlatformError::Unavailable { platform, .. }
            | PlatformError::RateLimited { platform }
            | PlatformError::Rejected { platform, .. } => Some(platform),
            PlatformError::Serialization(_) | PlatformError::Unsupported(_) => None,
        }
    }
}

/// Service tier a platform is operated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTier {
    /// Standard operation.
    Standard,
    /// Hardened operation suitable for critical/high priority traffic.
    Enterprise,
}

impl Default for ServiceTier {
    fn default() -> Self {
        ServiceTier::Standard
    }
}

/// Static description of a registered platform.
///
/// Descriptors are fixed at registration time; the capability→affinity
/// table is the scoring prior used when ranking platforms for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Platform identifier (matches the adapter's name).
    pub id: String,
    /// Capability tag → affinity score in [0, 1].
    pub affinities: HashMap<String, f64>,
    /// Languages the platform answers well in; empty means any.
    pub languages: Vec<String>,
    /// Operational tier.
    pub tier: ServiceTier,
}

impl PlatformDescriptor {
    /// Creates a descriptor with no declared capabilities.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            affinities: HashMap::new(),
            languages: Vec::new(),
            tier: ServiceTier::default(),
        }
    }

    /// Declares an affinity score for a capability tag (clamped to [0, 1]).
    #[must_use]
    pub fn with_affinity(mut self, capability: impl Into<String>, score: f64) -> Self {
        self.affinities.insert(capability.into(), score.clamp(0.0, 1.0));
        self
    }

    /// Declares a supported language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.push(language.into());
        self
    }

    /// Sets the operational tier.
    #[must_use]
    pub fn with_tier(mut self, tier: ServiceTier) -> Self {
        self.tier = tier;
        self
    }

    /// The declared affinity for a capability, if any.
    #[must_use]
    pub fn affinity(&self, capability: &str) -> Option<f64> {
        self.affinities.get(capability).copied()
    }

    /// Whether the platform covers the given language hint.
    #[must_use]
    pub fn supports_language(&self, language: &str) -> bool {
        self.languages.is_empty()
            || self.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
    }
}

/// Execution context handed to an adapter call: the per-attempt deadline
/// and the caller's cancellation token.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Time budget for this attempt.
    pub timeout: Duration,
    /// Cancellation signal propagated from the caller.
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    /// Creates a context with the given time budget and a fresh token.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, cancel: CancellationToken::new() }
    }

    /// Creates a context bound to an existing cancellation token.
    #[must_use]
    pub fn with_cancel(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }
}

/// The uniform contract each backend execution platform implements.
///
/// Adapters own backend-specific request translation. `execute` must honor
/// the context's deadline and cancellation: it returns within the allotted
/// budget or with an explicit error, and must not leave work running past
/// cancellation.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform identifier this adapter serves.
    fn name(&self) -> &str;

    /// The capability tags this platform declares.
    fn capabilities(&self) -> Vec<String>;

    /// Executes the query against the backend.
    ///
    /// # Arguments
    /// * `request` - The unified query to serve
    /// * `ctx` - Deadline and cancellation for this attempt
    ///
    /// # Errors
    /// Returns a `PlatformError` classifying the failure for failover.
    async fn execute(
        &self,
        request: &UnifiedQueryRequest,
        ctx: &ExecutionContext,
    ) -> Result<PlatformReply, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse_and_display() {
        assert_eq!(QueryPriority::parse("critical"), Some(QueryPriority::Critical));
        assert_eq!(QueryPriority::parse("BATCH"), Some(QueryPriority::Batch));
        assert_eq!(QueryPriority::parse("urgent"), None);
        assert_eq!(QueryPriority::High.to_string(), "high");
    }

    #[test]
    fn test_request_deserializes_from_wire_json() {
        let json = r#"{
            "query": "explain our data retention policy",
            "platformPreference": "doc-search",
            "context": ["policy handbook"],
            "priority": "high",
            "responseFormat": "structured",
            "language": "en"
        }"#;
        let req: UnifiedQueryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.query, "explain our data retention policy");
        assert_eq!(req.platform_preference.as_deref(), Some("doc-search"));
        assert_eq!(req.priority, QueryPriority::High);
        assert_eq!(req.response_format, ResponseFormat::Structured);
        assert_eq!(req.context.len(), 1);
    }

    #[test]
    fn test_request_defaults() {
        let req: UnifiedQueryRequest = serde_json::from_str(r#"{"query": "hi"}"#).unwrap();
        assert_eq!(req.priority, QueryPriority::Normal);
        assert_eq!(req.response_format, ResponseFormat::Text);
        assert_eq!(req.language, "en");
        assert!(req.context.is_empty());
        assert!(req.tracking_id.is_none());
    }

    #[test]
    fn test_error_retryability() {
        let timeout = PlatformError::Timeout { platform: "a".to_string() };
        let rejected =
            PlatformError::Rejected { platform: "a".to_string(), reason: "bad".to_string() };
        let rate_limited = PlatformError::RateLimited { platform: "a".to_string() };
        assert!(timeout.is_retryable());
        assert!(rate_limited.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!PlatformError::Serialization("oops".to_string()).is_retryable());
        assert_eq!(timeout.platform(), Some("a"));
    }

    #[test]
    fn test_descriptor_affinity_is_clamped() {
        let descriptor = PlatformDescriptor::new("doc-search")
            .with_affinity("document-search", 1.4)
            .with_affinity("conversational", -0.2);
        assert_eq!(descriptor.affinity("document-search"), Some(1.0));
        assert_eq!(descriptor.affinity("conversational"), Some(0.0));
        assert_eq!(descriptor.affinity("unknown"), None);
    }

    #[test]
    fn test_descriptor_language_support() {
        let any = PlatformDescriptor::new("a");
        assert!(any.supports_language("en"));

        let scoped = PlatformDescriptor::new("b").with_language("en").with_language("de");
        assert!(scoped.supports_language("EN"));
        assert!(!scoped.supports_language("fr"));
    }

    #[test]
    fn test_reply_confidence_is_clamped() {
        let reply = PlatformReply::new("answer").with_confidence(1.7);
        assert_eq!(reply.confidence, 1.0);
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = UnifiedQueryResponse {
            request_id: "r-1".to_string(),
            query: "q".to_string(),
            answer: "a".to_string(),
            platform_used: "doc-search".to_string(),
            confidence_score: 0.9,
            sources: Vec::new(),
            processing_time_ms: 12,
            metadata: HashMap::new(),
            next_actions: Vec::new(),
            cache_hit: false,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("requestId").is_some());
        assert!(json.get("platformUsed").is_some());
        assert!(json.get("processingTimeMs").is_some());
        assert!(json.get("cacheHit").is_some());
        // Empty next_actions are omitted from the wire form.
        assert!(json.get("nextActions").is_none());
    }
}
