//! Content-addressed result cache
//!
//! Keys are derived only from the match-relevant profile fields and the
//! strategy, never from request or session ids. Reads are bounded by a short
//! timeout and treat any failure as a miss; writes are spawned and only
//! logged on failure.

pub mod memory;
pub mod redis_store;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::warn;

use crate::config::CacheBackend;
use crate::config::CacheSettings;
use crate::errors::Result;
use crate::models::MatchingProfile;
use crate::models::SelectionResult;
use crate::models::Strategy;

/// Bump when `SelectionResult` changes shape
const KEY_VERSION: &str = "match:v1";

/// Byte store with per-key expiry
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;
}

#[derive(Serialize)]
struct FingerprintFields<'a> {
    grade_band: &'a str,
    traits: Vec<&'a str>,
    interests: Vec<&'a str>,
    family_values: Vec<&'a str>,
    description: String,
}

/// SHA-256 (hex) over a canonical serialization of the match-relevant fields
pub fn fingerprint(profile: &MatchingProfile) -> String {
    let mut traits: Vec<&str> = profile.traits.iter().map(String::as_str).collect();
    traits.sort_unstable();
    let fields = FingerprintFields {
        grade_band: profile.grade_band.as_str(),
        traits,
        interests: profile.primary_interests.iter().map(String::as_str).collect(),
        family_values: profile.family_values.iter().map(String::as_str).collect(),
        description: profile
            .description_text
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
    };

    let mut hasher = Sha256::new();
    // serializing plain strings and vectors cannot fail
    if let Ok(bytes) = serde_json::to_vec(&fields) {
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// Store key for a fingerprint under one strategy
pub fn cache_key(fingerprint: &str, strategy: Strategy) -> String {
    format!("{KEY_VERSION}:{strategy}:{fingerprint}")
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    read_timeouts: AtomicU64,
    read_errors: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub read_timeouts: u64,
    pub read_errors: u64,
    pub writes: u64,
    pub write_failures: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Clone)]
pub struct ResultCache {
    store: Option<Arc<dyn KeyValueStore>>,
    ttl: Duration,
    read_timeout: Duration,
    counters: Arc<Counters>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration, read_timeout: Duration) -> Self {
        Self {
            store: Some(store),
            ttl,
            read_timeout,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Cache that never hits and never writes
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttl: Duration::ZERO,
            read_timeout: Duration::ZERO,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Build the store selected by `[cache] backend`
    pub fn from_settings(settings: &CacheSettings) -> Result<Self> {
        let ttl = Duration::from_secs(settings.ttl_secs);
        let read_timeout = Duration::from_millis(settings.read_timeout_ms);
        match settings.backend {
            CacheBackend::None => Ok(Self::disabled()),
            CacheBackend::Memory => {
                let store = MemoryStore::new(settings.max_entries);
                store.start_cleanup_task(Duration::from_secs(300));
                Ok(Self::new(Arc::new(store), ttl, read_timeout))
            }
            CacheBackend::Redis => {
                let url = settings.redis_url.as_deref().unwrap_or("redis://127.0.0.1:6379");
                let store = RedisStore::connect(url, settings.namespace.clone())?;
                Ok(Self::new(Arc::new(store), ttl, read_timeout))
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn backend_name(&self) -> &str {
        self.store.as_ref().map_or("none", |s| s.name())
    }

    /// Cached result for `key`; timeouts, store errors and undecodable
    /// payloads all count as a miss
    pub async fn get(&self, key: &str) -> Option<SelectionResult> {
        let store = self.store.as_ref()?;

        let bytes = match tokio::time::timeout(self.read_timeout, store.get(key)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Result cache miss");
                return None;
            }
            Ok(Err(e)) => {
                self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key, error = %e, store = store.name(), "Result cache read failed");
                return None;
            }
            Err(_) => {
                self.counters.read_timeouts.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key,
                    timeout_ms = self.read_timeout.as_millis() as u64,
                    "Result cache read timed out"
                );
                return None;
            }
        };

        match serde_json::from_slice::<SelectionResult>(&bytes) {
            Ok(mut result) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Result cache hit");
                result.from_cache = true;
                Some(result)
            }
            Err(e) => {
                self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                warn!(key, error = %e, "Discarding undecodable cache payload");
                None
            }
        }
    }

    /// Write and wait for the store to acknowledge
    pub async fn store(&self, key: &str, result: &SelectionResult) -> Result<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        let mut payload = result.clone();
        payload.from_cache = false;
        let bytes = serde_json::to_vec(&payload)?;
        store.set(key, bytes, self.ttl.as_secs()).await?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Fire-and-forget write; failures are only logged
    pub fn put(&self, key: String, result: SelectionResult) {
        if self.store.is_none() {
            return;
        }
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.store(&key, &result).await {
                cache.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Result cache write failed");
            }
        });
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            read_timeouts: c.read_timeouts.load(Ordering::Relaxed),
            read_errors: c.read_errors.load(Ordering::Relaxed),
            writes: c.writes.load(Ordering::Relaxed),
            write_failures: c.write_failures.load(Ordering::Relaxed),
        }
    }
}
