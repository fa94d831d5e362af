//! In-process reference implementation of `SharedCache` (§4.6's "shared
//! remote key-value store with TTL" tier).
//!
//! Production deployments implement `SharedCache` against whatever real
//! shared store they run (memcached, Redis, …); no such client is
//! fabricated here since none of the example repos in the pack pull one
//! in (see DESIGN.md). `DashMap` (a teacher dependency) stands in as the
//! in-process reference, giving the same read-through/write-through tests
//! a real multi-tier path to exercise without a network dependency.

use crate::application::cache_overlay::SharedCache;
use crate::domain::errors::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    value: Vec<u8>,
    inserted: Instant,
    ttl: Duration,
}

/// `DashMap`-backed stand-in for a shared KV store. Entries expire lazily
/// (checked on `get`), matching how a real TTL-backed remote store would
/// behave from this crate's point of view.
#[derive(Default)]
pub struct InProcessSharedCache {
    entries: DashMap<String, Entry>,
}

impl InProcessSharedCache {
    pub fn new() -> Self {
        InProcessSharedCache { entries: DashMap::new() }
    }
}

#[async_trait]
impl SharedCache for InProcessSharedCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if Instant::now().saturating_duration_since(entry.inserted) > entry.ttl {
            drop(entry);
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_owned(), Entry { value, inserted: Instant::now(), ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = InProcessSharedCache::new();
        cache.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn ttl_expiry_masks_stale_entries() {
        let cache = InProcessSharedCache::new();
        cache.set("k", b"v".to_vec(), Duration::from_millis(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = InProcessSharedCache::new();
        cache.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
