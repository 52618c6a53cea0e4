//! In-memory cache store.
//!
//! Default backend when no external store is configured. Entries expire
//! lazily: an expired entry is dropped on the next read of its key, and a
//! counter whose window has passed restarts from zero. Every
//! [`SWEEP_EVERY`] writes the whole map is also swept, so expired keys
//! that are never read again (orphaned sessions, one-off counters) still
//! get reclaimed without a background task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::store::{CacheStore, StoreError, WindowCount};

/// Writes between amortized sweeps of expired entries.
const SWEEP_EVERY: usize = 256;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expired_at(Instant::now())
    }

    fn expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Process-local [`CacheStore`] backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Called with no guards held; `retain`
    /// takes the shard locks itself.
    fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.expired_at(now));
    }

    fn count_write(&self) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        // The read guard must drop before the remove, or the shard
        // deadlocks against itself.
        match self.entries.get(key) {
            Some(entry) if !entry.expired() => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.entries.remove(key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        self.count_write();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<WindowCount, StoreError> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: b"0".to_vec(),
            expires_at: Some(now + ttl),
        });

        if entry.expired_at(now) {
            entry.value = b"0".to_vec();
            entry.expires_at = Some(now + ttl);
        }

        let current: u64 = std::str::from_utf8(&entry.value)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or(StoreError::NotACounter)?;

        let count = current + 1;
        entry.value = count.to_string().into_bytes();
        let remaining = entry
            .expires_at
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(ttl);

        // The entry guard must drop before the sweep can take its shard.
        drop(entry);
        self.count_write();
        Ok(WindowCount { count, remaining })
    }
}
