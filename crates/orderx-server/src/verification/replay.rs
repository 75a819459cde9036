use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;

pub const DEFAULT_MAX_SKEW_SECS: i64 = 300;
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(60 * 60);

/// Timestamps above this are taken to be in milliseconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Normalizes a platform timestamp in seconds or milliseconds to seconds.
pub fn normalize_timestamp(timestamp: i64) -> i64 {
    if timestamp > MILLIS_THRESHOLD {
        timestamp / 1000
    } else {
        timestamp
    }
}

pub fn is_fresh_at(timestamp: i64, now_secs: i64, max_skew_secs: i64) -> bool {
    let skew = now_secs.saturating_sub(normalize_timestamp(timestamp)).saturating_abs();
    skew <= max_skew_secs
}

/// Bounded event-id set with per-entry TTL. Eviction is strictly by
/// insertion age, never by access.
pub struct DedupCache {
    capacity: usize,
    ttl: Duration,
    first_seen: HashMap<String, Instant>,
    insertion_order: VecDeque<(String, Instant)>,
}

impl DedupCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            first_seen: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }

    pub fn contains_at(&mut self, event_id: &str, now: Instant) -> bool {
        self.purge_expired(now);
        self.first_seen.contains_key(event_id)
    }

    /// Inserts `event_id` unless present. Returns `true` if it was inserted.
    pub fn insert_at(&mut self, event_id: &str, now: Instant) -> bool {
        self.purge_expired(now);
        if self.first_seen.contains_key(event_id) {
            return false;
        }
        while self.first_seen.len() >= self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }
        self.first_seen.insert(event_id.to_string(), now);
        self.insertion_order.push_back((event_id.to_string(), now));
        true
    }

    pub fn remove(&mut self, event_id: &str) -> bool {
        let Some(seen) = self.first_seen.remove(event_id) else {
            return false;
        };
        // Released ids must not keep a queue slot, or claim/release cycles
        // would grow the queue past `capacity` until the TTL catches up.
        if let Some(pos) = self
            .insertion_order
            .iter()
            .position(|(id, at)| *at == seen && id == event_id)
        {
            self.insertion_order.remove(pos);
        }
        true
    }

    pub fn purge_expired(&mut self, now: Instant) {
        while let Some((_, seen)) = self.insertion_order.front() {
            if now.saturating_duration_since(*seen) < self.ttl {
                break;
            }
            self.pop_entry();
        }
    }

    fn evict_oldest(&mut self) -> bool {
        while !self.insertion_order.is_empty() {
            if self.pop_entry() {
                return true;
            }
        }
        false
    }

    /// Pops the queue front; removes the map entry only if it still belongs
    /// to that insertion.
    fn pop_entry(&mut self) -> bool {
        let Some((id, seen)) = self.insertion_order.pop_front() else {
            return false;
        };
        if self.first_seen.get(&id) == Some(&seen) {
            self.first_seen.remove(&id);
            return true;
        }
        false
    }
}

/// Timestamp-skew check plus event-id deduplication, shared by all webhook
/// requests of a process.
pub struct ReplayGuard {
    max_skew_secs: i64,
    cache: Mutex<DedupCache>,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SKEW_SECS, DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_TTL)
    }
}

impl ReplayGuard {
    pub fn new(max_skew_secs: i64, capacity: usize, ttl: Duration) -> Self {
        Self {
            max_skew_secs,
            cache: Mutex::new(DedupCache::new(capacity, ttl)),
        }
    }

    pub fn is_fresh(&self, timestamp: i64) -> bool {
        is_fresh_at(timestamp, Utc::now().timestamp(), self.max_skew_secs)
    }

    pub fn is_duplicate(&self, event_id: &str) -> bool {
        self.cache.lock().contains_at(event_id, Instant::now())
    }

    pub fn mark_processed(&self, event_id: &str) {
        self.cache.lock().insert_at(event_id, Instant::now());
    }

    /// Atomic `is_duplicate` + `mark_processed`. Returns `false` when the id
    /// was already seen within the TTL.
    pub fn try_claim(&self, event_id: &str) -> bool {
        self.cache.lock().insert_at(event_id, Instant::now())
    }

    /// Forgets a claimed id so the platform's redelivery is processed.
    pub fn release(&self, event_id: &str) {
        self.cache.lock().remove(event_id);
    }
}
