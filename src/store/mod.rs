//! Shared cache-store client.
//!
//! One store instance backs every stateful middleware concern: sessions,
//! rate-limit counters, the response cache and seen-IP tracking. Callers
//! prefix their keys (`sess:`, `ratelimit:`, `cache:`, `ip:`), so a single
//! backend — in-memory by default, anything that implements [`CacheStore`]
//! otherwise — serves all of them, and processes sharing a backend share
//! state.

pub mod memory;

pub use memory::InMemoryStore;

use std::time::Duration;

/// Store failures. Middleware degrades or fails the request depending on
/// the concern; construction treats them as fatal.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend-specific failure (connection, protocol).
    #[error("backend: {0}")]
    Backend(String),

    /// `incr` hit a key whose value is not a decimal counter.
    #[error("value at key is not a counter")]
    NotACounter,
}

/// Outcome of a fixed-window increment.
#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    /// Counter value after this increment.
    pub count: u64,

    /// Time left until the window expires and the counter restarts.
    /// Stable across increments in one window, so callers can advertise
    /// the real reset time instead of recomputing one per request.
    pub remaining: Duration,
}

/// Byte-oriented key/value store with expiry and atomic counters.
///
/// Values are opaque bytes; callers layer their own serialization on top.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a value. `ttl` of `None` keeps the entry until deleted.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically increment the counter at `key` and return the new value
    /// together with the time left in its window. Creating the counter
    /// starts its expiry window at `ttl`; an existing counter keeps its
    /// original window.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<WindowCount, StoreError>;
}
