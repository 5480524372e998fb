//! Types for the routing system.

use super::intent::QueryIntent;
use conflux_abstraction::QueryPriority;
use serde::Deserialize;

/// Weights for the platform scoring factors.
///
/// The four weights are expected to sum to 1.0; they are configuration, not
/// constants.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the intent/capability match.
    #[serde(default = "default_intent_weight")]
    pub intent: f64,
    /// Weight of the SLA/performance fit.
    #[serde(default = "default_performance_weight")]
    pub performance: f64,
    /// Weight of recent observed reliability.
    #[serde(default = "default_reliability_weight")]
    pub reliability: f64,
    /// Weight of the language/tier feature bonus.
    #[serde(default = "default_feature_weight")]
    pub feature: f64,
}

fn default_intent_weight() -> f64 {
    0.4
}
fn default_performance_weight() -> f64 {
    0.3
}
fn default_reliability_weight() -> f64 {
    0.2
}
fn default_feature_weight() -> f64 {
    0.1
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            intent: default_intent_weight(),
            performance: default_performance_weight(),
            reliability: default_reliability_weight(),
            feature: default_feature_weight(),
        }
    }
}

impl ScoringWeights {
    /// Checks that every weight is in [0, 1] and the sum is ~1.0.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("intent", self.intent),
            ("performance", self.performance),
            ("reliability", self.reliability),
            ("feature", self.feature),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!(
                    "scoring weight '{}' is {}, must be within [0, 1]",
                    name, value
                ));
            }
        }
        let sum = self.intent + self.performance + self.reliability + self.feature;
        if (sum - 1.0).abs() > 0.001 {
            return Err(format!("scoring weights sum to {}, expected 1.0", sum));
        }
        Ok(())
    }
}

/// SLA target for one priority class.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SlaTarget {
    /// Latency ceiling in milliseconds.
    pub latency_ms: u64,
    /// Availability floor in (0, 1].
    pub availability: f64,
}

/// SLA targets for all four priority classes.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SlaTargets {
    /// Target for critical priority.
    pub critical: SlaTarget,
    /// Target for high priority.
    pub high: SlaTarget,
    /// Target for normal priority.
    pub normal: SlaTarget,
    /// Target for batch priority.
    pub batch: SlaTarget,
}

impl Default for SlaTargets {
    fn default() -> Self {
        Self {
            critical: SlaTarget { latency_ms: 1000, availability: 0.999 },
            high: SlaTarget { latency_ms: 2000, availability: 0.995 },
            normal: SlaTarget { latency_ms: 5000, availability: 0.99 },
            batch: SlaTarget { latency_ms: 30_000, availability: 0.95 },
        }
    }
}

impl SlaTargets {
    /// The target for a priority class.
    #[must_use]
    pub fn for_priority(&self, priority: QueryPriority) -> SlaTarget {
        match priority {
            QueryPriority::Critical => self.critical,
            QueryPriority::High => self.high,
            QueryPriority::Normal => self.normal,
            QueryPriority::Batch => self.batch,
        }
    }

    /// Checks latency ceilings are positive and availability floors sane.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, target) in [
            ("critical", self.critical),
            ("high", self.high),
            ("normal", self.normal),
            ("batch", self.batch),
        ] {
            if target.latency_ms == 0 {
                return Err(format!("sla '{}': latency ceiling must be positive", name));
            }
            if !(target.availability > 0.0 && target.availability <= 1.0) {
                return Err(format!(
                    "sla '{}': availability {} must be within (0, 1]",
                    name, target.availability
                ));
            }
        }
        Ok(())
    }
}

/// One platform's score with its factor breakdown.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// The scored platform.
    pub platform_id: String,
    /// Weighted total score.
    pub score: f64,
    /// Intent/capability match factor (0-1).
    pub intent_match: f64,
    /// SLA/performance fit factor (0-1).
    pub performance_fit: f64,
    /// Recent reliability factor (0-1).
    pub reliability: f64,
    /// Language/tier feature bonus (0-1).
    pub feature_bonus: f64,
}

/// Ordered candidate list produced by the decision engine.
#[derive(Debug, Clone)]
pub struct Ranking {
    /// The classified query intent.
    pub intent: QueryIntent,
    /// Candidates, best first.
    pub candidates: Vec<ScoredCandidate>,
    /// Whether an explicit platform preference was moved to rank 1.
    pub preference_applied: bool,
}

impl Ranking {
    /// Candidate platform ids, best first.
    #[must_use]
    pub fn ordered_ids(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.platform_id.as_str()).collect()
    }
}
