use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::response::ApiResponse;

/// One cached response with its expiry bookkeeping.
#[derive(Clone, Debug)]
struct CacheEntry {
    value: ApiResponse,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.ttl
    }
}

/// In-memory key → response map with per-entry TTL and lazy expiry.
///
/// Owned by one client instance; never shared across clients and never
/// persisted. Only GET responses land here — the executor enforces that.
#[derive(Debug, Default)]
pub(crate) struct CacheStore {
    entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Live value for `key`, deleting it on read if the TTL has elapsed.
    pub(crate) fn get(&mut self, key: &str) -> Option<ApiResponse> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub(crate) fn set(&mut self, key: String, value: ApiResponse, ttl_ms: u64) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl: Duration::from_millis(ttl_ms),
            },
        );
    }

    /// Drops all entries.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops every expired entry. Opportunistic; correctness is carried by
    /// the lazy check in [`CacheStore::get`].
    pub(crate) fn sweep(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
