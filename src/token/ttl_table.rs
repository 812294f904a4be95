//! Concurrent string set whose entries expire a fixed time after last access.

use crate::token::clock::{Clock, saturating_millis};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;

/// A concurrent set of tokens with expire-after-access semantics.
///
/// Every successful lookup refreshes the entry. Expiry is checked lazily on
/// lookup, and [`cleanup_expired`](Self::cleanup_expired) reclaims memory for
/// entries nobody asks about again.
///
/// No lock is held between a caller's separate calls, so the TTL is best
/// effort: an entry looked up just before its deadline survives a while
/// longer, and concurrent lookups can observe slightly different ages.
pub struct TtlTable {
    entries: DashMap<String, i64>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlTable {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, last_access: i64, now: i64) -> bool {
        now - last_access >= saturating_millis(self.ttl)
    }

    /// Inserts `key`, or refreshes it if already present.
    pub fn insert(&self, key: &str) {
        let now = self.clock.now_millis();
        self.entries.insert(key.to_string(), now);
    }

    /// Inserts `key` unless an unexpired entry already exists.
    ///
    /// Returns `true` if this call inserted the key. The check and the insert
    /// happen under one shard lock, so exactly one of several racing callers
    /// wins.
    pub fn insert_if_absent(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if self.is_expired(*entry.get(), now) {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Returns `true` if `key` is present and unexpired, refreshing its access
    /// time. Expired entries found along the way are removed.
    pub fn touch(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        if let Some(mut last_access) = self.entries.get_mut(key) {
            if !self.is_expired(*last_access, now) {
                *last_access = now;
                return true;
            }
        } else {
            return false;
        }
        self.entries
            .remove_if(key, |_, last_access| self.is_expired(*last_access, now));
        false
    }

    /// Removes all expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries
            .retain(|_, last_access| !self.is_expired(*last_access, now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
