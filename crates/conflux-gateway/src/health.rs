//! Read-only health and diagnostics report.
//!
//! Derived entirely from metrics, limiter, and circuit snapshots; building
//! a report never touches the platform adapters.

use crate::metrics::MetricsSnapshot;
use crate::routing::CircuitState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Derived platform status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Serving traffic with an acceptable success rate.
    Healthy,
    /// Serving traffic but failing often or circuit-limited.
    Degraded,
    /// No observations yet.
    Unknown,
}

/// Health view of one platform.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformHealth {
    /// Platform identifier.
    pub platform_id: String,
    /// Derived status.
    pub status: HealthState,
    /// Recent success rate (0 with no samples).
    pub success_rate: f64,
    /// Recent average latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Samples currently in the metrics window.
    pub sample_count: usize,
    /// Admissions counted in the current rate window.
    pub window_admissions: u32,
    /// Whether the circuit breaker currently skips this platform.
    pub circuit_open: bool,
}

impl PlatformHealth {
    /// Builds the health view from component snapshots.
    #[must_use]
    pub fn from_snapshots(
        platform_id: impl Into<String>,
        metrics: &MetricsSnapshot,
        window_admissions: u32,
        circuit: CircuitState,
    ) -> Self {
        let circuit_open = matches!(circuit, CircuitState::Open(_));
        let status = if metrics.sample_count == 0 {
            HealthState::Unknown
        } else if circuit_open || metrics.success_rate < 0.8 {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        Self {
            platform_id: platform_id.into(),
            status,
            success_rate: metrics.success_rate,
            avg_latency_ms: metrics.avg_latency_ms,
            sample_count: metrics.sample_count,
            window_admissions,
            circuit_open,
        }
    }
}

/// Full gateway health report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Per-platform health, in registration order.
    pub platforms: Vec<PlatformHealth>,
    /// Requests currently holding global admission.
    pub in_flight: usize,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    /// Whether every platform with observations is healthy.
    #[must_use]
    pub fn all_healthy(&self) -> bool {
        self.platforms.iter().all(|p| p.status != HealthState::Degraded)
    }
}
