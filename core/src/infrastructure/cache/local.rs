//! Local LRU tier (§4.6/§5): a bounded map+list cache guarded by one
//! `parking_lot::Mutex`, with a probabilistic expired-entry sweep on
//! insert and counters that reset once any exceeds 2^40.
//!
//! `lru::LruCache` (a teacher dependency, originally earmarked for the
//! deferred secrets manager; repurposed here for its actually-specified
//! use) already pairs a hash map with an intrusive linked list and
//! promotes on `get`/evicts on `put` past capacity — exactly the
//! "list iterator for each entry lives in the map for O(1) promotion,
//! splice keeps iterators valid across moves" shape §4.6 describes, so it
//! is used directly rather than hand-rolled.

use crate::application::cache_overlay::{CacheStats, LocalCache};
use lru::LruCache;
use parking_lot::Mutex;
use rand::Rng;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Counters reset to zero once any single one would exceed this, per
/// §4.6's explicit overflow-avoidance note.
const COUNTER_RESET_THRESHOLD: u64 = 1 << 40;

/// Probability (as a 1-in-N ratio) of sweeping expired entries before an
/// insert, per §4.6.
const SWEEP_DENOMINATOR: u32 = 16;

struct Entry {
    value: Vec<u8>,
    inserted: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted) > self.ttl
    }
}

struct State {
    cache: LruCache<String, Entry>,
    stats: CacheStats,
}

impl State {
    fn bump(&mut self, f: impl FnOnce(&mut CacheStats)) {
        f(&mut self.stats);
        let CacheStats { gets, sets, hits, misses, dels, purged, expired } = self.stats;
        if [gets, sets, hits, misses, dels, purged, expired].iter().any(|c| *c > COUNTER_RESET_THRESHOLD) {
            self.stats = CacheStats::default();
        }
    }
}

/// §4.6: the bounded in-process tier. Each entry carries its own TTL +
/// insertion time; `timeout` here is the independent local-tier timeout
/// spec.md names separately from the shared tier's TTL.
pub struct LocalLru {
    state: Mutex<State>,
}

impl LocalLru {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        LocalLru { state: Mutex::new(State { cache: LruCache::new(cap), stats: CacheStats::default() }) }
    }

    /// Opportunistically sweeps expired entries (age > their own TTL)
    /// before an insert, with probability 1/`SWEEP_DENOMINATOR` (§4.6).
    fn maybe_sweep(&self, state: &mut State) {
        if rand::thread_rng().gen_range(0..SWEEP_DENOMINATOR) != 0 {
            return;
        }
        let now = Instant::now();
        let expired_keys: Vec<String> =
            state.cache.iter().filter(|(_, e)| e.is_expired(now)).map(|(k, _)| k.clone()).collect();
        let count = expired_keys.len() as u64;
        for key in expired_keys {
            state.cache.pop(&key);
        }
        if count > 0 {
            state.bump(|s| s.expired += count);
            state.bump(|s| s.purged += count);
        }
    }
}

impl LocalCache for LocalLru {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.bump(|s| s.gets += 1);
        let now = Instant::now();
        match state.cache.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                state.bump(|s| s.hits += 1);
                Some(value)
            }
            Some(_) => {
                state.cache.pop(key);
                state.bump(|s| s.misses += 1);
                state.bump(|s| s.expired += 1);
                None
            }
            None => {
                state.bump(|s| s.misses += 1);
                None
            }
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut state = self.state.lock();
        self.maybe_sweep(&mut state);
        state.cache.put(key.to_owned(), Entry { value, inserted: Instant::now(), ttl });
        state.bump(|s| s.sets += 1);
    }

    fn delete(&self, key: &str) {
        let mut state = self.state.lock();
        if state.cache.pop(key).is_some() {
            state.bump(|s| s.dels += 1);
        }
    }

    fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_hits() {
        let lru = LocalLru::new(4);
        lru.set("a", b"1".to_vec(), Duration::from_secs(60));
        assert_eq!(lru.get("a"), Some(b"1".to_vec()));
        assert_eq!(lru.stats().hits, 1);
    }

    #[test]
    fn miss_on_unknown_key() {
        let lru = LocalLru::new(4);
        assert_eq!(lru.get("missing"), None);
        assert_eq!(lru.stats().misses, 1);
    }

    #[test]
    fn expired_entries_are_not_served() {
        let lru = LocalLru::new(4);
        lru.set("a", b"1".to_vec(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(lru.get("a"), None);
    }

    #[test]
    fn eviction_past_capacity_drops_least_recently_used() {
        let lru = LocalLru::new(2);
        lru.set("a", b"1".to_vec(), Duration::from_secs(60));
        lru.set("b", b"2".to_vec(), Duration::from_secs(60));
        lru.set("c", b"3".to_vec(), Duration::from_secs(60));
        assert_eq!(lru.get("a"), None);
        assert!(lru.get("b").is_some());
        assert!(lru.get("c").is_some());
    }

    #[test]
    fn delete_removes_entry() {
        let lru = LocalLru::new(4);
        lru.set("a", b"1".to_vec(), Duration::from_secs(60));
        lru.delete("a");
        assert_eq!(lru.get("a"), None);
    }
}
