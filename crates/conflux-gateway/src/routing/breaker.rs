//! Circuit breaker for platform failure detection.
//!
//! Platforms that fail persistently are taken out of the failover walk for
//! a cooldown period, then probed with a single request before being
//! readmitted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit state for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Skipping the platform until the cooldown expires.
    Open(Instant),
    /// Cooldown expired; one probe request is allowed through.
    HalfOpen,
}

/// Breaker thresholds.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    /// Failure-rate threshold above which the circuit opens.
    pub failure_threshold: f64,
    /// Sliding window over which the failure rate is computed.
    pub window: Duration,
    /// How long an open circuit skips the platform before probing.
    pub cooldown: Duration,
    /// Minimum outcomes in the window before the circuit may open.
    pub min_samples: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 0.8,
            window: Duration::from_secs(300),
            cooldown: Duration::from_secs(60),
            min_samples: 8,
        }
    }
}

#[derive(Debug)]
struct Outcome {
    at: Instant,
    success: bool,
}

#[derive(Debug)]
struct PlatformState {
    state: CircuitState,
    outcomes: VecDeque<Outcome>,
}

impl PlatformState {
    fn new() -> Self {
        Self { state: CircuitState::Closed, outcomes: VecDeque::new() }
    }

    fn push(&mut self, success: bool, window: Duration) {
        let now = Instant::now();
        self.outcomes.push_back(Outcome { at: now, success });
        while let Some(front) = self.outcomes.front() {
            if now.duration_since(front.at) > window {
                self.outcomes.pop_front();
            } else {
                break;
            }
        }
    }

    fn failure_rate(&self) -> (f64, usize) {
        let total = self.outcomes.len();
        if total == 0 {
            return (0.0, 0);
        }
        let failures = self.outcomes.iter().filter(|o| !o.success).count();
        (failures as f64 / total as f64, total)
    }
}

/// Per-platform circuit breaker with a sliding failure window.
pub struct PlatformCircuitBreaker {
    platforms: Mutex<HashMap<String, PlatformState>>,
    settings: BreakerSettings,
}

impl PlatformCircuitBreaker {
    /// Creates a breaker with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(BreakerSettings::default())
    }

    /// Creates a breaker with custom settings.
    #[must_use]
    pub fn with_settings(settings: BreakerSettings) -> Self {
        Self { platforms: Mutex::new(HashMap::new()), settings }
    }

    /// Records a successful call.
    ///
    /// A success while half-open closes the circuit and resets history, so
    /// stale failures from the open period cannot immediately reopen it.
    pub fn on_success(&self, platform_id: &str) {
        let mut platforms = self.platforms.lock().expect("breaker lock poisoned");
        let state = platforms
            .entry(platform_id.to_string())
            .or_insert_with(PlatformState::new);

        if state.state == CircuitState::HalfOpen {
            debug!(platform = %platform_id, "Circuit breaker: HalfOpen -> Closed");
            state.state = CircuitState::Closed;
            state.outcomes.clear();
            return;
        }

        state.push(true, self.settings.window);
    }

    /// Records a failed call, opening the circuit when warranted.
    pub fn on_failure(&self, platform_id: &str) {
        let mut platforms = self.platforms.lock().expect("breaker lock poisoned");
        let state = platforms
            .entry(platform_id.to_string())
            .or_insert_with(PlatformState::new);

        if state.state == CircuitState::HalfOpen {
            warn!(platform = %platform_id, "Circuit breaker: HalfOpen -> Open (probe failed)");
            state.state = CircuitState::Open(Instant::now());
            return;
        }

        state.push(false, self.settings.window);

        if matches!(state.state, CircuitState::Closed) {
            let (rate, samples) = state.failure_rate();
            if samples >= self.settings.min_samples && rate > self.settings.failure_threshold
            {
                warn!(
                    platform = %platform_id,
                    failure_rate = rate,
                    samples = samples,
                    "Circuit breaker: Closed -> Open"
                );
                state.state = CircuitState::Open(Instant::now());
            }
        }
    }

    /// Whether the platform should be skipped right now.
    ///
    /// Transitions Open → HalfOpen once the cooldown has elapsed; the
    /// half-open probe call is admitted.
    pub fn is_open(&self, platform_id: &str) -> bool {
        let mut platforms = self.platforms.lock().expect("breaker lock poisoned");
        let Some(state) = platforms.get_mut(platform_id) else {
            return false;
        };

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => false,
            CircuitState::Open(opened_at) => {
                if opened_at.elapsed() >= self.settings.cooldown {
                    debug!(platform = %platform_id, "Circuit breaker: Open -> HalfOpen");
                    state.state = CircuitState::HalfOpen;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Current state for diagnostics.
    #[must_use]
    pub fn state(&self, platform_id: &str) -> CircuitState {
        let platforms = self.platforms.lock().expect("breaker lock poisoned");
        platforms.get(platform_id).map_or(CircuitState::Closed, |s| s.state)
    }
}

impl Default for PlatformCircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings() -> BreakerSettings {
        BreakerSettings {
            failure_threshold: 0.5,
            window: Duration::from_secs(300),
            cooldown: Duration::from_millis(50),
            min_samples: 4,
        }
    }

    #[test]
    fn test_opens_past_threshold_with_min_samples() {
        let breaker = PlatformCircuitBreaker::with_settings(fast_settings());

        // Three failures are below min_samples: still closed.
        for _ in 0..3 {
            breaker.on_failure("a");
        }
        assert!(!breaker.is_open("a"));

        breaker.on_failure("a");
        assert!(breaker.is_open("a"));
        assert!(matches!(breaker.state("a"), CircuitState::Open(_)));
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let breaker = PlatformCircuitBreaker::with_settings(fast_settings());
        for _ in 0..6 {
            breaker.on_success("a");
        }
        for _ in 0..3 {
            breaker.on_failure("a");
        }
        assert!(!breaker.is_open("a"));
    }

    #[test]
    fn test_half_open_probe_recloses_on_success() {
        let breaker = PlatformCircuitBreaker::with_settings(fast_settings());
        for _ in 0..4 {
            breaker.on_failure("a");
        }
        assert!(breaker.is_open("a"));

        std::thread::sleep(Duration::from_millis(60));
        assert!(!breaker.is_open("a"));
        assert_eq!(breaker.state("a"), CircuitState::HalfOpen);

        breaker.on_success("a");
        assert_eq!(breaker.state("a"), CircuitState::Closed);
        assert!(!breaker.is_open("a"));
    }

    #[test]
    fn test_half_open_probe_reopens_on_failure() {
        let breaker = PlatformCircuitBreaker::with_settings(fast_settings());
        for _ in 0..4 {
            breaker.on_failure("a");
        }
        std::thread::sleep(Duration::from_millis(60));
        assert!(!breaker.is_open("a")); // transitions to half-open

        breaker.on_failure("a");
        assert!(matches!(breaker.state("a"), CircuitState::Open(_)));
        assert!(breaker.is_open("a"));
    }

    #[test]
    fn test_unknown_platform_is_closed() {
        let breaker = PlatformCircuitBreaker::new();
        assert!(!breaker.is_open("ghost"));
        assert_eq!(breaker.state("ghost"), CircuitState::Closed);
    }
}
