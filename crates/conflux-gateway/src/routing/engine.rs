//! Decision engine: scores and ranks platforms for a query.

use super::intent::QueryIntent;
use super::types::{Ranking, ScoredCandidate, ScoringWeights, SlaTargets};
use crate::error::{GatewayError, Result};
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::registry::PlatformRegistry;
use conflux_abstraction::{
    PlatformDescriptor, QueryPriority, ServiceTier, UnifiedQueryRequest,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Latency used to normalize observed averages into [0, 1].
const LATENCY_NORM_MS: f64 = 10_000.0;
/// Neutral intent score for platforms declaring none of an intent's tags.
const NEUTRAL_INTENT_MATCH: f64 = 0.5;
/// Assumed success rate for platforms with no samples, in the SLA fit.
const COLD_START_AVAILABILITY: f64 = 0.98;

/// Scores every registered platform against a request and produces an
/// ordered candidate list.
///
/// Scoring reads point-in-time metric snapshots; it never holds a lock
/// across the computation, so concurrent requests may observe slightly
/// stale values. That staleness is accepted: routing needs no strict
/// consistency.
pub struct DecisionEngine {
    registry: Arc<PlatformRegistry>,
    metrics: Arc<MetricsRecorder>,
    weights: ScoringWeights,
    slas: SlaTargets,
    cold_start_reliability: f64,
}

impl DecisionEngine {
    /// Creates an engine with default weights, SLAs, and priors.
    #[must_use]
    pub fn new(registry: Arc<PlatformRegistry>, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            registry,
            metrics,
            weights: ScoringWeights::default(),
            slas: SlaTargets::default(),
            cold_start_reliability: 0.8,
        }
    }

    /// Sets the scoring weights.
    #[must_use]
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the per-priority SLA targets.
    #[must_use]
    pub fn with_slas(mut self, slas: SlaTargets) -> Self {
        self.slas = slas;
        self
    }

    /// Sets the reliability assumed for platforms with no samples yet.
    #[must_use]
    pub fn with_cold_start_reliability(mut self, prior: f64) -> Self {
        self.cold_start_reliability = prior.clamp(0.0, 1.0);
        self
    }

    /// Produces the ranked candidate list for a request.
    ///
    /// The list is never empty while at least one platform is registered;
    /// an empty registry is reported as `NoPlatformsRegistered`.
    ///
    /// # Errors
    /// Returns `GatewayError::NoPlatformsRegistered` on an empty registry.
    pub fn select_ranking(&self, request: &UnifiedQueryRequest) -> Result<Ranking> {
        if self.registry.is_empty() {
            return Err(GatewayError::NoPlatformsRegistered);
        }

        let intent = QueryIntent::classify(&request.query);

        let mut candidates: Vec<ScoredCandidate> = self
            .registry
            .iter()
            .map(|entry| self.score_platform(&entry.descriptor, intent, request))
            .collect();

        // Stable sort keeps registration order for equal scores.
        candidates.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut preference_applied = false;
        if let Some(ref preferred) = request.platform_preference {
            if let Some(position) =
                candidates.iter().position(|c| &c.platform_id == preferred)
            {
                let candidate = candidates.remove(position);
                candidates.insert(0, candidate);
                preference_applied = true;
                debug!(platform = %preferred, "Explicit preference moved to rank 1");
            } else {
                warn!(platform = %preferred, "Ignoring preference for unregistered platform");
            }
        }

        info!(
            intent = %intent,
            top = %candidates[0].platform_id,
            top_score = candidates[0].score,
            preference_applied = preference_applied,
            "Ranked platforms for query"
        );

        Ok(Ranking { intent, candidates, preference_applied })
    }

    fn score_platform(
        &self,
        descriptor: &PlatformDescriptor,
        intent: QueryIntent,
        request: &UnifiedQueryRequest,
    ) -> ScoredCandidate {
        let snapshot = self.metrics.snapshot(&descriptor.id);
        let sla = self.slas.for_priority(request.priority);

        let intent_match = Self::intent_match(descriptor, intent);
        let performance_fit = Self::performance_fit(&snapshot, sla.latency_ms, sla.availability);
        let reliability = self.recent_reliability(&snapshot);
        let feature_bonus = Self::feature_bonus(descriptor, request);

        let score = self.weights.intent * intent_match
            + self.weights.performance * performance_fit
            + self.weights.reliability * reliability
            + self.weights.feature * feature_bonus;

        debug!(
            platform = %descriptor.id,
            score = score,
            intent_match = intent_match,
            performance_fit = performance_fit,
            reliability = reliability,
            feature_bonus = feature_bonus,
            "Scored platform"
        );

        ScoredCandidate {
            platform_id: descriptor.id.clone(),
            score,
            intent_match,
            performance_fit,
            reliability,
            feature_bonus,
        }
    }

    /// Average declared affinity over the intent's capability tags;
    /// undeclared tags count as zero. A platform declaring none of the
    /// tags gets a neutral score rather than zero.
    fn intent_match(descriptor: &PlatformDescriptor, intent: QueryIntent) -> f64 {
        let tags = intent.capability_tags();
        let declared: Vec<f64> =
            tags.iter().filter_map(|tag| descriptor.affinity(tag)).collect();
        if declared.is_empty() {
            return NEUTRAL_INTENT_MATCH;
        }
        declared.iter().sum::<f64>() / tags.len() as f64
    }

    /// How well observed performance fits the priority's SLA: the mean of a
    /// latency fit (ceiling / observed, capped) and an availability fit
    /// (observed rate / floor, capped). Neutral with no samples.
    fn performance_fit(
        snapshot: &MetricsSnapshot,
        latency_ceiling_ms: u64,
        availability_floor: f64,
    ) -> f64 {
        if snapshot.sample_count == 0 {
            return (1.0 + (COLD_START_AVAILABILITY / availability_floor).min(1.0)) / 2.0;
        }

        let latency_fit = if snapshot.avg_latency_ms > 0.0 {
            (latency_ceiling_ms as f64 / snapshot.avg_latency_ms).min(1.0)
        } else {
            1.0
        };
        let availability_fit = (snapshot.success_rate / availability_floor).min(1.0);
        (latency_fit + availability_fit) / 2.0
    }

    /// Success rate discounted by observed latency; a configured prior
    /// covers platforms with no samples (cold start).
    fn recent_reliability(&self, snapshot: &MetricsSnapshot) -> f64 {
        if snapshot.sample_count == 0 {
            return self.cold_start_reliability;
        }
        let normalized_latency = (snapshot.avg_latency_ms / LATENCY_NORM_MS).min(1.0);
        (snapshot.success_rate * (1.0 - normalized_latency)).max(0.0)
    }

    /// Small additive bonus for language coverage and service-tier
    /// alignment with the request's priority.
    fn feature_bonus(descriptor: &PlatformDescriptor, request: &UnifiedQueryRequest) -> f64 {
        let language = if descriptor.supports_language(&request.language) { 1.0 } else { 0.0 };
        let tier_aligned = matches!(
            request.priority,
            QueryPriority::Critical | QueryPriority::High
        ) && descriptor.tier == ServiceTier::Enterprise;
        let tier = if tier_aligned { 1.0 } else { 0.0 };
        0.6 * language + 0.4 * tier
    }
}
