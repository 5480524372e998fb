//! Failover coordination across the ranked candidate list.
//!
//! Each request walks its ranking in order: skip platforms with an open
//! circuit or an exhausted rate window, call the adapter under the
//! priority's attempt timeout, advance on retryable failures, stop on
//! non-retryable ones, and report exhaustion with per-attempt diagnostics.

use super::breaker::PlatformCircuitBreaker;
use super::types::{Ranking, SlaTargets};
use crate::error::{AttemptFailure, GatewayError, Result};
use crate::limiter::RateLimiter;
use crate::metrics::{MetricsRecorder, PerformanceSample};
use crate::registry::PlatformRegistry;
use conflux_abstraction::{
    ExecutionContext, PlatformAdapter, PlatformError, PlatformReply, UnifiedQueryRequest,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a successful dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The platform that served the request.
    pub platform_id: String,
    /// The platform's raw reply.
    pub reply: PlatformReply,
    /// Failed or skipped attempts before the success (empty if none).
    pub attempts: Vec<AttemptFailure>,
}

impl DispatchOutcome {
    /// Whether any candidate failed before this reply was produced.
    #[must_use]
    pub fn failover_occurred(&self) -> bool {
        !self.attempts.is_empty()
    }
}

/// Walks a ranking until a platform answers or candidates run out.
pub struct FailoverCoordinator {
    registry: Arc<PlatformRegistry>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsRecorder>,
    breaker: Arc<PlatformCircuitBreaker>,
    slas: SlaTargets,
}

impl FailoverCoordinator {
    /// Creates a coordinator over the shared routing state.
    #[must_use]
    pub fn new(
        registry: Arc<PlatformRegistry>,
        limiter: Arc<RateLimiter>,
        metrics: Arc<MetricsRecorder>,
        breaker: Arc<PlatformCircuitBreaker>,
        slas: SlaTargets,
    ) -> Self {
        Self { registry, limiter, metrics, breaker, slas }
    }

    /// Per-attempt time budget, derived from the priority's SLA ceiling.
    #[must_use]
    pub fn attempt_timeout(&self, request: &UnifiedQueryRequest) -> Duration {
        Duration::from_millis(self.slas.for_priority(request.priority).latency_ms)
    }

    /// Dispatches the request across the ranked candidates.
    ///
    /// # Errors
    /// - `Cancelled` when the caller's token fires; no further candidates
    ///   are tried.
    /// - `Platform` when a candidate fails non-retryably (the chain stops).
    /// - `AllPlatformsFailed` when every candidate was tried or skipped,
    ///   listing each exactly once.
    pub async fn dispatch(
        &self,
        request: &UnifiedQueryRequest,
        ranking: &Ranking,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let mut attempts: Vec<AttemptFailure> = Vec::new();
        let attempt_timeout = self.attempt_timeout(request);

        for candidate in &ranking.candidates {
            let platform_id = candidate.platform_id.as_str();

            if cancel.is_cancelled() {
                debug!(platform = %platform_id, "Dispatch cancelled before attempt");
                return Err(GatewayError::Cancelled);
            }

            let Some(entry) = self.registry.get(platform_id) else {
                // Ranking and registry are built from the same table; a
                // miss here is a wiring bug, not a routing outcome.
                warn!(platform = %platform_id, "Ranked platform missing from registry");
                continue;
            };

            if self.breaker.is_open(platform_id) {
                debug!(platform = %platform_id, "Skipping platform with open circuit");
                attempts.push(AttemptFailure::skipped(platform_id, "circuit open"));
                continue;
            }

            if !self.limiter.try_platform_admit(platform_id) {
                debug!(platform = %platform_id, "Skipping platform with exhausted rate window");
                attempts.push(AttemptFailure::skipped(
                    platform_id,
                    "platform rate window exhausted",
                ));
                continue;
            }

            let ctx = ExecutionContext::with_cancel(attempt_timeout, cancel.child_token());
            let started = Instant::now();

            let result = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(platform = %platform_id, "Dispatch cancelled mid-attempt");
                    return Err(GatewayError::Cancelled);
                }
                attempt = timeout(attempt_timeout, entry.adapter.execute(request, &ctx)) => {
                    match attempt {
                        Ok(inner) => inner,
                        Err(_) => Err(PlatformError::Timeout {
                            platform: platform_id.to_string(),
                        }),
                    }
                }
            };

            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(reply) => {
                    self.breaker.on_success(platform_id);
                    self.metrics.record(
                        platform_id,
                        PerformanceSample::success(latency_ms, reply.confidence),
                    );
                    if attempts.is_empty() {
                        debug!(platform = %platform_id, latency_ms, "Dispatch succeeded");
                    } else {
                        info!(
                            platform = %platform_id,
                            latency_ms,
                            failed_attempts = attempts.len(),
                            "Dispatch succeeded after failover"
                        );
                    }
                    return Ok(DispatchOutcome {
                        platform_id: platform_id.to_string(),
                        reply,
                        attempts,
                    });
                }
                Err(error) => {
                    self.breaker.on_failure(platform_id);
                    self.metrics.record(platform_id, PerformanceSample::failure(latency_ms));

                    if error.is_retryable() {
                        warn!(
                            platform = %platform_id,
                            error = %error,
                            "Retryable platform failure, advancing to next candidate"
                        );
                        attempts.push(AttemptFailure::from_error(platform_id, &error));
                    } else {
                        warn!(
                            platform = %platform_id,
                            error = %error,
                            "Non-retryable platform failure, stopping failover"
                        );
                        return Err(GatewayError::Platform(error));
                    }
                }
            }
        }

        warn!(attempted = attempts.len(), "All candidate platforms failed");
        Err(GatewayError::AllPlatformsFailed(attempts))
    }
}
