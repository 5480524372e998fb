//! Response cache with TTL and a pluggable byte store.
//!
//! The cache is an accelerator, never the source of truth: lookups that
//! fail and writes that fail are logged and otherwise invisible to the
//! request pipeline.

use conflux_abstraction::UnifiedQueryRequest;
use conflux_abstraction::UnifiedQueryResponse;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Error from a cache backend.
#[derive(Debug, Error)]
#[error("cache backend error: {0}")]
pub struct CacheStoreError(pub String);

/// A key/value byte store with per-entry TTL.
///
/// Any store satisfying this contract (in-process map, external key-value
/// service) is interchangeable. Concurrent `set` for the same key is
/// last-write-wins.
pub trait CacheStore: Send + Sync {
    /// Fetches the value for a key if present and unexpired.
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, CacheStoreError>;

    /// Stores a value under a key with the given TTL.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), CacheStoreError>;
}

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-process `CacheStore` backed by a locked map.
///
/// Expired entries are purged lazily on access.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired, not yet purged) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache store lock poisoned").len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for InMemoryStore {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, CacheStoreError> {
        let expired = {
            let entries = self.entries.read().expect("cache store lock poisoned");
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.bytes.clone()));
                }
                Some(_) => true,
            }
        };

        if expired {
            let mut entries = self.entries.write().expect("cache store lock poisoned");
            // Re-check under the write lock; a concurrent set may have
            // refreshed the entry.
            if let Some(entry) = entries.get(key) {
                if entry.expires_at <= Instant::now() {
                    entries.remove(key);
                } else {
                    return Ok(Some(entry.bytes.clone()));
                }
            }
        }
        Ok(None)
    }

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), CacheStoreError> {
        let mut entries = self.entries.write().expect("cache store lock poisoned");
        entries.insert(
            key.to_string(),
            StoredValue { bytes: value, expires_at: Instant::now() + ttl },
        );
        Ok(())
    }
}

/// TTL cache of normalized responses keyed by request fingerprint.
pub struct ResponseCache {
    store: std::sync::Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ResponseCache {
    /// Creates a cache over the given store with a default TTL.
    #[must_use]
    pub fn new(store: std::sync::Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Deterministic fingerprint over the fields that define answer
    /// equivalence: query, language, response format, priority, context.
    #[must_use]
    pub fn cache_key(request: &UnifiedQueryRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.query.as_bytes());
        hasher.update([0x1f]);
        hasher.update(request.language.as_bytes());
        hasher.update([0x1f]);
        hasher.update(request.response_format.to_string().as_bytes());
        hasher.update([0x1f]);
        hasher.update(request.priority.to_string().as_bytes());
        for snippet in &request.context {
            hasher.update([0x1f]);
            hasher.update(snippet.as_bytes());
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        format!("unified-response:{}", &hex[..32])
    }

    /// Looks up a cached response for the request.
    ///
    /// Backend and decode failures degrade to a miss.
    #[must_use]
    pub fn lookup(&self, request: &UnifiedQueryRequest) -> Option<UnifiedQueryResponse> {
        let key = Self::cache_key(request);
        let bytes = match self.store.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice::<UnifiedQueryResponse>(&bytes) {
            Ok(response) => {
                debug!(key = %key, "Cache hit");
                Some(response)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached entry undecodable, treating as miss");
                None
            }
        }
    }

    /// Stores a response, best-effort: failures are logged, never returned.
    pub fn store(&self, request: &UnifiedQueryRequest, response: &UnifiedQueryResponse) {
        let key = Self::cache_key(request);
        let bytes = match serde_json::to_vec(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode response for cache");
                return;
            }
        };
        if let Err(e) = self.store.set(&key, bytes, self.ttl) {
            warn!(key = %key, error = %e, "Cache write failed (non-fatal)");
        } else {
            debug!(key = %key, ttl_secs = self.ttl.as_secs(), "Cached response");
        }
    }
}
