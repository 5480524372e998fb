//! The gateway orchestrator.
//!
//! Composes the pipeline: validate → cache lookup → admission → ranking →
//! failover dispatch → normalize, cache, and record. Admission is released
//! by dropping the token, on every exit path.

use crate::cache::{CacheStore, InMemoryStore, ResponseCache};
use crate::config::{ConfigError, GatewayConfig, GatewayConfigLoader};
use crate::error::{AttemptFailure, GatewayError, Result};
use crate::health::{HealthReport, PlatformHealth};
use crate::limiter::RateLimiter;
use crate::metrics::MetricsRecorder;
use crate::registry::PlatformRegistry;
use crate::routing::{
    DecisionEngine, DispatchOutcome, FailoverCoordinator, PlatformCircuitBreaker, QueryIntent,
};
use crate::validator::RequestValidator;
use chrono::Utc;
use conflux_abstraction::{PlatformError, UnifiedQueryRequest, UnifiedQueryResponse};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Adaptive multi-platform query gateway.
///
/// One instance owns all process-wide routing state (metrics windows,
/// admission counters, circuit states, cache) and is shared across request
/// handlers behind an `Arc`.
pub struct Gateway {
    registry: Arc<PlatformRegistry>,
    validator: RequestValidator,
    cache: ResponseCache,
    metrics: Arc<MetricsRecorder>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<PlatformCircuitBreaker>,
    engine: DecisionEngine,
    failover: FailoverCoordinator,
}

impl Gateway {
    /// Builds a gateway, including its platform registry, from
    /// configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` when the configuration is invalid or an
    /// adapter cannot be created.
    pub fn from_config(config: &GatewayConfig) -> std::result::Result<Self, ConfigError> {
        GatewayConfigLoader::validate(config)?;
        let registry = GatewayConfigLoader::build_registry(config)?;
        Ok(Self::with_registry(registry, config))
    }

    /// Builds a gateway over an already-assembled registry, with an
    /// in-process cache store.
    #[must_use]
    pub fn with_registry(registry: PlatformRegistry, config: &GatewayConfig) -> Self {
        Self::with_cache_backend(registry, config, Arc::new(InMemoryStore::new()))
    }

    /// Builds a gateway with a caller-provided cache backend.
    #[must_use]
    pub fn with_cache_backend(
        registry: PlatformRegistry,
        config: &GatewayConfig,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        if registry.is_empty() {
            warn!("Gateway constructed with no registered platforms; queries will fail to route");
        }

        let registry = Arc::new(registry);
        let metrics =
            Arc::new(MetricsRecorder::new(registry.ids(), config.metrics.window_size));
        let limiter =
            Arc::new(RateLimiter::new(config.limits.to_qos_limits(), registry.ids()));
        let breaker = Arc::new(PlatformCircuitBreaker::new());
        let engine = DecisionEngine::new(Arc::clone(&registry), Arc::clone(&metrics))
            .with_weights(config.scoring.weights)
            .with_slas(config.sla)
            .with_cold_start_reliability(config.scoring.cold_start_reliability);
        let failover = FailoverCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&limiter),
            Arc::clone(&metrics),
            Arc::clone(&breaker),
            config.sla,
        );
        let cache = ResponseCache::new(store, config.cache.ttl());

        Self {
            registry,
            validator: RequestValidator::new(),
            cache,
            metrics,
            limiter,
            breaker,
            engine,
            failover,
        }
    }

    /// Processes a unified query with no external cancellation.
    ///
    /// # Errors
    /// `Validation`, `RateLimitExceeded`, `NoPlatformsRegistered`, and
    /// `Cancelled` are returned as errors so callers can distinguish
    /// "rejected" from "tried and failed"; dispatch failures are converted
    /// into a well-formed response carrying `error` metadata.
    pub async fn process(&self, request: UnifiedQueryRequest) -> Result<UnifiedQueryResponse> {
        self.process_with_cancellation(request, CancellationToken::new()).await
    }

    /// Processes a unified query, honoring the caller's cancellation token.
    ///
    /// # Errors
    /// See [`Gateway::process`].
    pub async fn process_with_cancellation(
        &self,
        request: UnifiedQueryRequest,
        cancel: CancellationToken,
    ) -> Result<UnifiedQueryResponse> {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        info!(
            request_id = %request_id,
            priority = %request.priority,
            query_len = request.query.len(),
            "Processing unified query"
        );

        self.validator.validate(&request)?;

        if let Some(mut cached) = self.cache.lookup(&request) {
            info!(request_id = %request_id, "Serving response from cache");
            cached.request_id = request_id;
            cached.cache_hit = true;
            cached.processing_time_ms = started.elapsed().as_millis() as u64;
            cached.timestamp = Utc::now();
            return Ok(cached);
        }

        // Released when this scope ends, whatever the exit path.
        let _admission = self.limiter.admit(request.priority).await?;

        let ranking = self.engine.select_ranking(&request)?;

        match self.failover.dispatch(&request, &ranking, &cancel).await {
            Ok(outcome) => {
                let response =
                    self.build_response(&request, request_id, ranking.intent, outcome, started);
                self.cache.store(&request, &response);
                Ok(response)
            }
            Err(GatewayError::AllPlatformsFailed(attempts)) => {
                Ok(Self::failure_response(&request, request_id, &attempts, None, started))
            }
            Err(GatewayError::Platform(error)) => {
                let attempts = vec![AttemptFailure::from_error(
                    error.platform().unwrap_or("unknown"),
                    &error,
                )];
                Ok(Self::failure_response(
                    &request,
                    request_id,
                    &attempts,
                    Some(&error),
                    started,
                ))
            }
            Err(other) => Err(other),
        }
    }

    /// Read-only health view across all registered platforms.
    #[must_use]
    pub fn health_report(&self) -> HealthReport {
        let platforms = self
            .registry
            .iter()
            .map(|entry| {
                let id = entry.descriptor.id.as_str();
                PlatformHealth::from_snapshots(
                    id,
                    &self.metrics.snapshot(id),
                    self.limiter.platform_window_count(id),
                    self.breaker.state(id),
                )
            })
            .collect();
        HealthReport {
            platforms,
            in_flight: self.limiter.in_flight(),
            generated_at: Utc::now(),
        }
    }

    /// The registered platform table.
    #[must_use]
    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    /// Requests currently holding global admission.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.limiter.in_flight()
    }

    fn build_response(
        &self,
        request: &UnifiedQueryRequest,
        request_id: String,
        intent: QueryIntent,
        outcome: DispatchOutcome,
        started: Instant,
    ) -> UnifiedQueryResponse {
        let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
        metadata.insert("intent".to_string(), json!(intent.to_string()));
        metadata.insert("failover_occurred".to_string(), json!(outcome.failover_occurred()));
        if outcome.failover_occurred() {
            metadata.insert("attempted_platforms".to_string(), json!(outcome.attempts));
        }
        if !outcome.reply.metadata.is_empty() {
            metadata.insert("platform_metadata".to_string(), json!(outcome.reply.metadata));
        }
        if let Some(ref tracking_id) = request.tracking_id {
            metadata.insert("tracking_id".to_string(), json!(tracking_id));
        }

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            request_id = %request_id,
            platform = %outcome.platform_id,
            processing_time_ms,
            confidence = outcome.reply.confidence,
            "Unified query served"
        );

        UnifiedQueryResponse {
            request_id,
            query: request.query.clone(),
            answer: outcome.reply.answer,
            platform_used: outcome.platform_id,
            confidence_score: outcome.reply.confidence.clamp(0.0, 1.0),
            sources: outcome.reply.sources,
            processing_time_ms,
            metadata,
            next_actions: outcome.reply.next_actions,
            cache_hit: false,
            timestamp: Utc::now(),
        }
    }

    /// Builds the well-formed response for a failed dispatch: the original
    /// query, a readable explanation, and per-attempt diagnostics. Failure
    /// responses are never cached.
    fn failure_response(
        request: &UnifiedQueryRequest,
        request_id: String,
        attempts: &[AttemptFailure],
        stop_error: Option<&PlatformError>,
        started: Instant,
    ) -> UnifiedQueryResponse {
        let answer = match stop_error {
            Some(error) => format!("The query could not be processed: {}.", error),
            None => format!(
                "The query could not be processed: all {} candidate platforms failed.",
                attempts.len()
            ),
        };

        let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
        metadata.insert("error".to_string(), json!(true));
        metadata.insert("attempted_platforms".to_string(), json!(attempts));
        if let Some(ref tracking_id) = request.tracking_id {
            metadata.insert("tracking_id".to_string(), json!(tracking_id));
        }

        warn!(
            request_id = %request_id,
            attempted = attempts.len(),
            "Returning failure response for unified query"
        );

        UnifiedQueryResponse {
            request_id,
            query: request.query.clone(),
            answer,
            platform_used: "none".to_string(),
            confidence_score: 0.0,
            sources: Vec::new(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            metadata,
            next_actions: vec![
                "Retry the request".to_string(),
                "Contact support if the problem persists".to_string(),
            ],
            cache_hit: false,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_abstraction::{PlatformDescriptor, QueryPriority};
    use conflux_platforms::MockAdapter;

    fn single_platform_gateway() -> Gateway {
        let registry = PlatformRegistry::builder()
            .register(
                Arc::new(MockAdapter::new("only")),
                PlatformDescriptor::new("only"),
            )
            .build()
            .unwrap();
        Gateway::with_registry(registry, &GatewayConfig::default())
    }

    #[tokio::test]
    async fn test_single_platform_serves_request() {
        let gateway = single_platform_gateway();
        let response = gateway.process(UnifiedQueryRequest::new("hello")).await.unwrap();
        assert_eq!(response.platform_used, "only");
        assert!(!response.cache_hit);
        assert_eq!(response.query, "hello");
        assert!(!response.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_is_distinct() {
        let gateway = single_platform_gateway();
        let result = gateway.process(UnifiedQueryRequest::new("")).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
        // Nothing was admitted for the rejected request.
        assert_eq!(gateway.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_no_platforms_releases_admission_once() {
        let registry = PlatformRegistry::builder().build().unwrap();
        let gateway = Gateway::with_registry(registry, &GatewayConfig::default());

        let result = gateway.process(UnifiedQueryRequest::new("hello")).await;
        assert!(matches!(result, Err(GatewayError::NoPlatformsRegistered)));
        assert_eq!(gateway.in_flight(), 0);

        // The path stays clean on repeat calls (no leaked permits).
        let result = gateway.process(UnifiedQueryRequest::new("hello")).await;
        assert!(matches!(result, Err(GatewayError::NoPlatformsRegistered)));
        assert_eq!(gateway.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_not_cached() {
        let gateway = single_platform_gateway();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = gateway
            .process_with_cancellation(UnifiedQueryRequest::new("hello"), cancel)
            .await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));

        // A later identical request is a cache miss served live.
        let response = gateway.process(UnifiedQueryRequest::new("hello")).await.unwrap();
        assert!(!response.cache_hit);
    }

    #[tokio::test]
    async fn test_failure_response_is_well_formed() {
        let registry = PlatformRegistry::builder()
            .register(
                Arc::new(MockAdapter::new("down").failing(
                    conflux_abstraction::PlatformError::Unavailable {
                        platform: "down".to_string(),
                        message: "maintenance".to_string(),
                    },
                )),
                PlatformDescriptor::new("down"),
            )
            .build()
            .unwrap();
        let gateway = Gateway::with_registry(registry, &GatewayConfig::default());

        let response = gateway
            .process(UnifiedQueryRequest::new("hello").with_priority(QueryPriority::High))
            .await
            .unwrap();
        assert_eq!(response.metadata.get("error"), Some(&json!(true)));
        assert!(!response.answer.is_empty());
        assert_eq!(response.query, "hello");
        assert_eq!(response.confidence_score, 0.0);
        assert!(!response.next_actions.is_empty());
        assert_eq!(gateway.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_health_report_reflects_traffic() {
        let gateway = single_platform_gateway();
        let before = gateway.health_report();
        assert_eq!(before.platforms.len(), 1);
        assert_eq!(before.platforms[0].sample_count, 0);

        gateway.process(UnifiedQueryRequest::new("hello")).await.unwrap();

        let after = gateway.health_report();
        assert_eq!(after.platforms[0].sample_count, 1);
        assert_eq!(after.platforms[0].window_admissions, 1);
        assert_eq!(after.in_flight, 0);
    }
}
