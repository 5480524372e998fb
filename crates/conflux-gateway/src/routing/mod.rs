//! Adaptive platform routing.
//!
//! This module scores registered platforms against an incoming query's
//! intent and priority, produces a ranked candidate list, and walks that
//! list with per-attempt timeouts and failure classification until a
//! platform answers or the list is exhausted.

pub mod breaker;
pub mod engine;
pub mod failover;
pub mod intent;
pub mod types;

pub use breaker::{BreakerSettings, CircuitState, PlatformCircuitBreaker};
pub use engine::DecisionEngine;
pub use failover::{DispatchOutcome, FailoverCoordinator};
pub use intent::QueryIntent;
pub use types::{Ranking, ScoredCandidate, ScoringWeights, SlaTarget, SlaTargets};
