//! Adaptive multi-platform query routing gateway.
//!
//! Conflux accepts a single uniform "answer this query" request and routes
//! it across heterogeneous backend execution platforms: every registered
//! platform is scored against the query's intent and priority, the ranked
//! candidates are tried in order with per-attempt timeouts and failure
//! classification, results are cached with a TTL, and admission is governed
//! by four priority classes with bounded queues.
//!
//! The top-level entry point is [`Gateway`]; platform backends plug in
//! through the `PlatformAdapter` trait from `conflux-abstraction`.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod limiter;
pub mod metrics;
pub mod registry;
pub mod routing;
pub mod validator;

pub use cache::{CacheStore, CacheStoreError, InMemoryStore, ResponseCache};
pub use config::{
    CacheSettings, ConfigError, GatewayConfig, GatewayConfigLoader, LimitSettings,
    MetricsSettings, PlatformEntryConfig, ScoringSettings,
};
pub use error::{AttemptFailure, GatewayError};
pub use gateway::Gateway;
pub use health::{HealthReport, HealthState, PlatformHealth};
pub use limiter::{AdmissionToken, QosLimits, RateLimiter, RateWindow};
pub use metrics::{MetricsRecorder, MetricsSnapshot, PerformanceSample};
pub use registry::{PlatformEntry, PlatformRegistry, PlatformRegistryBuilder};
pub use routing::{
    BreakerSettings, CircuitState, DecisionEngine, DispatchOutcome, FailoverCoordinator,
    PlatformCircuitBreaker, QueryIntent, Ranking, ScoredCandidate, ScoringWeights, SlaTarget,
    SlaTargets,
};
pub use validator::RequestValidator;
