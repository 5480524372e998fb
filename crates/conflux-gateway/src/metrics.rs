//! Rolling per-platform performance metrics.
//!
//! Each platform gets a fixed-capacity ring buffer of samples, appended
//! after every completed adapter call. Buffers are guarded by per-platform
//! locks so recording for one platform never contends with another.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::warn;

/// Default ring-buffer capacity per platform.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// One observed adapter call outcome.
#[derive(Debug, Clone)]
pub struct PerformanceSample {
    /// When the call completed.
    pub timestamp: DateTime<Utc>,
    /// Whether the call succeeded.
    pub success: bool,
    /// Observed latency in milliseconds.
    pub latency_ms: u64,
    /// Confidence reported with the answer (0.0 for failures).
    pub confidence: f64,
}

impl PerformanceSample {
    /// Creates a sample for a successful call.
    #[must_use]
    pub fn success(latency_ms: u64, confidence: f64) -> Self {
        Self { timestamp: Utc::now(), success: true, latency_ms, confidence }
    }

    /// Creates a sample for a failed call.
    #[must_use]
    pub fn failure(latency_ms: u64) -> Self {
        Self { timestamp: Utc::now(), success: false, latency_ms, confidence: 0.0 }
    }
}

/// Point-in-time aggregate over a platform's sample window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    /// Mean latency over the window, in milliseconds.
    pub avg_latency_ms: f64,
    /// Fraction of successful calls over the window.
    pub success_rate: f64,
    /// Mean confidence over successful calls.
    pub avg_confidence: f64,
    /// Number of samples currently in the window.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Snapshot of a platform with no recorded samples.
    #[must_use]
    pub fn empty() -> Self {
        Self { avg_latency_ms: 0.0, success_rate: 0.0, avg_confidence: 0.0, sample_count: 0 }
    }
}

/// Recorder holding one bounded sample window per registered platform.
///
/// The platform set is fixed at construction; samples for unknown
/// platforms are dropped with a warning rather than growing the map.
pub struct MetricsRecorder {
    windows: HashMap<String, Mutex<VecDeque<PerformanceSample>>>,
    capacity: usize,
}

impl MetricsRecorder {
    /// Creates a recorder for the given platform ids.
    ///
    /// # Arguments
    /// * `platform_ids` - The fixed set of platforms to track
    /// * `capacity` - Ring-buffer size per platform (clamped to >= 1)
    #[must_use]
    pub fn new<I, S>(platform_ids: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capacity = capacity.max(1);
        let windows = platform_ids
            .into_iter()
            .map(|id| (id.into(), Mutex::new(VecDeque::with_capacity(capacity))))
            .collect();
        Self { windows, capacity }
    }

    /// Appends a sample to a platform's window, aging out the oldest
    /// sample when the window is full.
    pub fn record(&self, platform_id: &str, sample: PerformanceSample) {
        let Some(window) = self.windows.get(platform_id) else {
            warn!(platform = %platform_id, "Dropping sample for unknown platform");
            return;
        };

        let mut window = window.lock().expect("metrics window lock poisoned");
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(sample);
    }

    /// Computes the aggregate over a platform's current window.
    ///
    /// Unknown platforms and empty windows yield an empty snapshot with
    /// `sample_count == 0`; consumers apply their own cold-start priors.
    #[must_use]
    pub fn snapshot(&self, platform_id: &str) -> MetricsSnapshot {
        let Some(window) = self.windows.get(platform_id) else {
            return MetricsSnapshot::empty();
        };

        let window = window.lock().expect("metrics window lock poisoned");
        if window.is_empty() {
            return MetricsSnapshot::empty();
        }

        let count = window.len();
        let total_latency: u64 = window.iter().map(|s| s.latency_ms).sum();
        let successes = window.iter().filter(|s| s.success).count();
        let confidence_sum: f64 =
            window.iter().filter(|s| s.success).map(|s| s.confidence).sum();

        MetricsSnapshot {
            avg_latency_ms: total_latency as f64 / count as f64,
            success_rate: successes as f64 / count as f64,
            avg_confidence: if successes > 0 { confidence_sum / successes as f64 } else { 0.0 },
            sample_count: count,
        }
    }

    /// The ring-buffer capacity per platform.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
