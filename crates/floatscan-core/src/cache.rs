//! Explicit time-bounded caching for candidate sets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::sourcing::{CandidateSet, SourcingMode};

/// A value with the instant it was fetched and how long it stays fresh.
#[derive(Debug, Clone)]
pub struct TimedValue<T> {
    pub value: T,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<T> TimedValue<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            ttl,
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_stale(&self) -> bool {
        self.age() >= self.ttl
    }
}

/// Caller-owned cache holding one candidate set per sourcing mode.
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct CandidateCache {
    entries: Arc<tokio::sync::RwLock<HashMap<SourcingMode, TimedValue<CandidateSet>>>>,
    ttl: Duration,
}

impl Default for CandidateCache {
    /// Five minutes.
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl CandidateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached set for `mode` unless it is missing or stale.
    pub async fn fresh(&self, mode: SourcingMode) -> Option<CandidateSet> {
        let entries = self.entries.read().await;
        entries
            .get(&mode)
            .filter(|entry| !entry.is_stale())
            .map(|entry| entry.value.clone())
    }

    /// Stores `set` for `mode`. Empty sets are not cached so the next call
    /// retries the sources.
    pub async fn store(&self, mode: SourcingMode, set: CandidateSet) {
        if set.is_empty() || self.ttl.is_zero() {
            return;
        }
        self.entries
            .write()
            .await
            .insert(mode, TimedValue::new(set, self.ttl));
    }

    pub async fn invalidate(&self, mode: SourcingMode) {
        self.entries.write().await.remove(&mode);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
