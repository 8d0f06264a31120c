//! In-process TTL store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::KeyValueStore;
use crate::errors::Result;

/// Cache entry with TTL support
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Eviction counters for monitoring
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStoreStats {
    pub evictions: u64,
    pub expired_cleanups: u64,
}

/// `HashMap` behind a tokio `RwLock`; clones share the same map
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
    stats: Arc<RwLock<MemoryStoreStats>>,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
            stats: Arc::new(RwLock::new(MemoryStoreStats::default())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> MemoryStoreStats {
        *self.stats.read().await
    }

    /// Clear all entries
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        debug!("Cleared all memory cache entries");
    }

    /// Clean up expired entries
    pub async fn cleanup_expired(&self) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = (before - entries.len()) as u64;

        if removed > 0 {
            self.stats.write().await.expired_cleanups += removed;
            debug!("Cleaned up {} expired cache entries", removed);
        }
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                store.cleanup_expired().await;
            }
        })
    }

    async fn evict_entries(&self, entries: &mut HashMap<String, CacheEntry>) {
        // Expired entries go first; otherwise drop the 10% closest to expiry
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let mut evicted = before - entries.len();

        if entries.len() >= self.max_entries {
            let evict_count = (entries.len() / 10).max(1);
            let mut by_expiry: Vec<(String, Instant)> = entries
                .iter()
                .map(|(k, e)| (k.clone(), e.expires_at))
                .collect();
            by_expiry.sort_by_key(|(_, expires_at)| *expires_at);
            for (key, _) in by_expiry.into_iter().take(evict_count) {
                entries.remove(&key);
            }
            evicted += evict_count;
        }

        self.stats.write().await.evictions += evicted as u64;
        debug!("Evicted {} cache entries", evicted);
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // expired: drop it under the write lock
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            self.evict_entries(&mut entries).await;
        }

        entries.insert(
            key.to_string(),
            CacheEntry::new(value, Duration::from_secs(ttl_secs)),
        );
        Ok(())
    }
}
