//! Admission control and QoS scheduling.
//!
//! Admission is two-staged: a bounded per-priority-class queue and a global
//! concurrency ceiling. Critical and high priority fail fast when full;
//! normal and batch may wait a short bounded interval. The asymmetry keeps
//! low-priority floods from starving high-priority admission.
//!
//! Per-platform throughput is tracked separately in fixed-length rate
//! windows, consulted once per failover attempt.

use crate::error::{GatewayError, Result};
use conflux_abstraction::QueryPriority;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Concurrency and throughput ceilings for the limiter.
#[derive(Debug, Clone)]
pub struct QosLimits {
    /// Queue depth for critical priority.
    pub critical_depth: usize,
    /// Queue depth for high priority.
    pub high_depth: usize,
    /// Queue depth for normal priority.
    pub normal_depth: usize,
    /// Queue depth for batch priority.
    pub batch_depth: usize,
    /// Global in-flight request ceiling across all classes.
    pub global_concurrency: usize,
    /// Longest a normal/batch request may wait for admission.
    pub low_priority_max_wait: Duration,
    /// Requests admitted per platform per window.
    pub platform_window_ceiling: u32,
    /// Length of the per-platform rate window.
    pub window_length: Duration,
}

impl Default for QosLimits {
    fn default() -> Self {
        Self {
            critical_depth: 100,
            high_depth: 200,
            normal_depth: 500,
            batch_depth: 1000,
            global_concurrency: 64,
            low_priority_max_wait: Duration::from_millis(250),
            platform_window_ceiling: 100,
            window_length: Duration::from_secs(60),
        }
    }
}

/// Fixed-length admission window for one platform.
#[derive(Debug)]
pub struct RateWindow {
    started: Instant,
    count: u32,
    ceiling: u32,
    length: Duration,
}

impl RateWindow {
    /// Creates a fresh window.
    #[must_use]
    pub fn new(ceiling: u32, length: Duration) -> Self {
        Self { started: Instant::now(), count: 0, ceiling, length }
    }

    fn roll_if_elapsed(&mut self) {
        if self.started.elapsed() >= self.length {
            self.started = Instant::now();
            self.count = 0;
        }
    }

    /// Counts one admission if the window has room.
    pub fn try_admit(&mut self) -> bool {
        self.roll_if_elapsed();
        if self.count < self.ceiling {
            self.count += 1;
            true
        } else {
            false
        }
    }

    /// Admissions counted in the current window.
    pub fn current_count(&mut self) -> u32 {
        self.roll_if_elapsed();
        self.count
    }
}

/// Admission token; dropping it releases both permits exactly once.
pub struct AdmissionToken {
    priority: QueryPriority,
    _class: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

impl AdmissionToken {
    /// The priority class this token was admitted under.
    #[must_use]
    pub fn priority(&self) -> QueryPriority {
        self.priority
    }
}

impl std::fmt::Debug for AdmissionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionToken").field("priority", &self.priority).finish()
    }
}

/// Priority-aware rate limiter with per-platform windows.
pub struct RateLimiter {
    limits: QosLimits,
    classes: [Arc<Semaphore>; 4],
    global: Arc<Semaphore>,
    platform_windows: HashMap<String, Mutex<RateWindow>>,
}

impl RateLimiter {
    /// Creates a limiter for the given platform ids.
    #[must_use]
    pub fn new<I, S>(limits: QosLimits, platform_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes = [
            Arc::new(Semaphore::new(limits.critical_depth)),
            Arc::new(Semaphore::new(limits.high_depth)),
            Arc::new(Semaphore::new(limits.normal_depth)),
            Arc::new(Semaphore::new(limits.batch_depth)),
        ];
        let global = Arc::new(Semaphore::new(limits.global_concurrency));
        let platform_windows = platform_ids
            .into_iter()
            .map(|id| {
                (
                    id.into(),
                    Mutex::new(RateWindow::new(
                        limits.platform_window_ceiling,
                        limits.window_length,
                    )),
                )
            })
            .collect();
        Self { limits, classes, global, platform_windows }
    }

    fn class_index(priority: QueryPriority) -> usize {
        match priority {
            QueryPriority::Critical => 0,
            QueryPriority::High => 1,
            QueryPriority::Normal => 2,
            QueryPriority::Batch => 3,
        }
    }

    fn fails_fast(priority: QueryPriority) -> bool {
        matches!(priority, QueryPriority::Critical | QueryPriority::High)
    }

    async fn acquire(
        &self,
        semaphore: &Arc<Semaphore>,
        priority: QueryPriority,
    ) -> Result<OwnedSemaphorePermit> {
        if Self::fails_fast(priority) {
            Arc::clone(semaphore)
                .try_acquire_owned()
                .map_err(|_| GatewayError::RateLimitExceeded { priority })
        } else {
            match timeout(
                self.limits.low_priority_max_wait,
                Arc::clone(semaphore).acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => Ok(permit),
                _ => Err(GatewayError::RateLimitExceeded { priority }),
            }
        }
    }

    /// Admits a request under its priority class and the global ceiling.
    ///
    /// # Errors
    /// Returns `RateLimitExceeded` when the class queue or the global
    /// ceiling is full (after the bounded wait for normal/batch).
    pub async fn admit(&self, priority: QueryPriority) -> Result<AdmissionToken> {
        let class_semaphore = &self.classes[Self::class_index(priority)];
        let class_permit = self.acquire(class_semaphore, priority).await.map_err(|e| {
            warn!(priority = %priority, "Admission denied: class queue full");
            e
        })?;

        // Class permit is released automatically if the global ceiling
        // denies the request.
        let global_permit = self.acquire(&self.global, priority).await.map_err(|e| {
            warn!(priority = %priority, "Admission denied: global ceiling reached");
            e
        })?;

        debug!(priority = %priority, "Request admitted");
        Ok(AdmissionToken { priority, _class: class_permit, _global: global_permit })
    }

    /// Counts an attempt against a platform's rate window.
    ///
    /// Returns `false` when the window is exhausted; unknown platforms are
    /// admitted with a warning (the registry is fixed at startup, so this
    /// indicates a wiring mistake, not traffic).
    pub fn try_platform_admit(&self, platform_id: &str) -> bool {
        match self.platform_windows.get(platform_id) {
            Some(window) => {
                window.lock().expect("rate window lock poisoned").try_admit()
            }
            None => {
                warn!(platform = %platform_id, "No rate window for platform, admitting");
                true
            }
        }
    }

    /// Admissions counted in a platform's current window.
    #[must_use]
    pub fn platform_window_count(&self, platform_id: &str) -> u32 {
        self.platform_windows
            .get(platform_id)
            .map_or(0, |w| w.lock().expect("rate window lock poisoned").current_count())
    }

    /// Requests currently holding global admission.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.limits.global_concurrency - self.global.available_permits()
    }

    /// Requests currently admitted under a priority class.
    #[must_use]
    pub fn class_in_flight(&self, priority: QueryPriority) -> usize {
        let depth = match priority {
            QueryPriority::Critical => self.limits.critical_depth,
            QueryPriority::High => self.limits.high_depth,
            QueryPriority::Normal => self.limits.normal_depth,
            QueryPriority::Batch => self.limits.batch_depth,
        };
        depth - self.classes[Self::class_index(priority)].available_permits()
    }
}
