//! `CachingCatalog`: the write-through `Catalog` decorator described in
//! §4.6. Grounded on the teacher's decorator-shaped `AegisFSAL` wrapping a
//! `StorageProvider`, generalized from wrapping a storage backend to
//! wrapping a `Catalog`.
//!
//! `LocalCache`/`SharedCache` are the two tiers' abstraction boundary,
//! implemented in `infrastructure::cache` — following this crate's pattern
//! of defining trait interfaces in `application/` and concrete adapters in
//! `infrastructure/` (the same inversion `InodeStore`/`PoolManager` use).

use crate::application::catalog::Catalog;
use crate::domain::acl::Acl;
use crate::domain::dirent::DirHandle;
use crate::domain::errors::CatalogError;
use crate::domain::identity::{Gid, Uid};
use crate::domain::inode::{Checksum, INode};
use crate::domain::replica::{Replica, ReplicaId};
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use md5::{Digest, Md5};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Key identifiers longer than this are hashed (§4.6).
const MAX_KEY_LEN: usize = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub gets: u64,
    pub sets: u64,
    pub hits: u64,
    pub misses: u64,
    pub dels: u64,
    pub purged: u64,
    pub expired: u64,
}

pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
    fn delete(&self, key: &str);
    fn stats(&self) -> CacheStats;
}

#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, crate::domain::errors::CacheError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), crate::domain::errors::CacheError>;
    /// Best-effort (`noreply`): failures are logged by the caller, never
    /// surfaced, since TTL is the ultimate backstop (§4.6).
    async fn delete(&self, key: &str) -> Result<(), crate::domain::errors::CacheError>;
}

/// §4.6 key scheme: `<prefix>:<identifier>`, with LFN identifiers over
/// `MAX_KEY_LEN` bytes replaced by `<prefix>:<hex(md5(lfn))>`.
pub fn cache_key(prefix: &str, identifier: &str) -> String {
    if identifier.len() <= MAX_KEY_LEN {
        return format!("{prefix}:{identifier}");
    }
    let mut hasher = Md5::new();
    hasher.update(identifier.as_bytes());
    format!("{prefix}:{}", hex::encode(hasher.finalize()))
}

fn jitter(base: Duration) -> Duration {
    let extra = rand::thread_rng().gen_range(0..=63u64);
    base + Duration::from_secs(extra)
}

pub struct CachingCatalog {
    inner: Arc<dyn Catalog>,
    local: Arc<dyn LocalCache>,
    shared: Arc<dyn SharedCache>,
    ttl: Duration,
}

impl CachingCatalog {
    pub fn new(inner: Arc<dyn Catalog>, local: Arc<dyn LocalCache>, shared: Arc<dyn SharedCache>, ttl: Duration) -> Self {
        CachingCatalog { inner, local, shared, ttl }
    }

    async fn read_through<T, F, Fut>(&self, key: &str, delegate: F) -> Result<T, CatalogError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, CatalogError>>,
    {
        if let Some(bytes) = self.local.get(key) {
            if let Ok(v) = serde_json::from_slice::<T>(&bytes) {
                return Ok(v);
            }
        }
        if let Ok(Some(bytes)) = self.shared.get(key).await {
            if let Ok(v) = serde_json::from_slice::<T>(&bytes) {
                self.local.set(key, bytes, self.ttl);
                return Ok(v);
            }
        }
        // A cache miss never masks a real error: the delegate call's error
        // surfaces without any write-back (§4.6).
        let value = delegate().await?;
        if let Ok(bytes) = serde_json::to_vec(&value) {
            self.local.set(key, bytes.clone(), self.ttl);
            if let Err(e) = self.shared.set(key, bytes, jitter(self.ttl)).await {
                tracing::warn!(key, error = %e, "cache overlay: best-effort shared write-back failed");
            }
        }
        Ok(value)
    }

    /// Deletes the key from both tiers. Best-effort: shared-tier failures
    /// are logged, never surfaced (§4.6).
    async fn invalidate(&self, key: &str) {
        self.local.delete(key);
        if let Err(e) = self.shared.delete(key).await {
            tracing::warn!(key, error = %e, "cache overlay: best-effort shared delete failed");
        }
    }
}

#[async_trait]
impl Catalog for CachingCatalog {
    fn impl_id(&self) -> String {
        format!("Cache over {}", self.inner.impl_id())
    }

    async fn extended_stat(&self, path: &str, follow_sym: bool) -> Result<INode, CatalogError> {
        let key = cache_key("stat", path);
        let inner = self.inner.clone();
        let path_owned = path.to_owned();
        self.read_through(&key, move || async move { inner.extended_stat(&path_owned, follow_sym).await }).await
    }

    async fn read_link(&self, path: &str) -> Result<String, CatalogError> {
        self.inner.read_link(path).await
    }

    async fn create(&self, path: &str, mode: u16) -> Result<INode, CatalogError> {
        let node = self.inner.create(path, mode).await?;
        self.invalidate(&cache_key("stat", path)).await;
        self.invalidate(&cache_key("dir", &parent_of(path))).await;
        Ok(node)
    }

    async fn make_dir(&self, path: &str, mode: u16) -> Result<INode, CatalogError> {
        let node = self.inner.make_dir(path, mode).await?;
        self.invalidate(&cache_key("dir", &parent_of(path))).await;
        Ok(node)
    }

    async fn symlink(&self, path: &str, target: &str) -> Result<INode, CatalogError> {
        let node = self.inner.symlink(path, target).await?;
        self.invalidate(&cache_key("dir", &parent_of(path))).await;
        Ok(node)
    }

    async fn unlink(&self, path: &str) -> Result<(), CatalogError> {
        self.inner.unlink(path).await?;
        self.invalidate(&cache_key("stat", path)).await;
        self.invalidate(&cache_key("dir", &parent_of(path))).await;
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<(), CatalogError> {
        self.inner.remove_dir(path).await?;
        self.invalidate(&cache_key("stat", path)).await;
        self.invalidate(&cache_key("dir", path)).await;
        self.invalidate(&cache_key("dir", &parent_of(path))).await;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), CatalogError> {
        self.inner.rename(from, to).await?;
        self.invalidate(&cache_key("stat", from)).await;
        self.invalidate(&cache_key("stat", to)).await;
        self.invalidate(&cache_key("dir", &parent_of(from))).await;
        self.invalidate(&cache_key("dir", &parent_of(to))).await;
        Ok(())
    }

    async fn set_mode(&self, path: &str, mode: u16) -> Result<(), CatalogError> {
        self.inner.set_mode(path, mode).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn set_owner(&self, path: &str, uid: Option<Uid>, gid: Option<Gid>) -> Result<(), CatalogError> {
        self.inner.set_owner(path, uid, gid).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn set_size(&self, path: &str, size: u64) -> Result<(), CatalogError> {
        self.inner.set_size(path, size).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn set_checksum(&self, path: &str, checksum: Checksum) -> Result<(), CatalogError> {
        self.inner.set_checksum(path, checksum).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn set_acl(&self, path: &str, acl: Acl) -> Result<(), CatalogError> {
        self.inner.set_acl(path, acl).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn set_guid(&self, path: &str, guid: Uuid) -> Result<(), CatalogError> {
        self.inner.set_guid(path, guid).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn utime(&self, path: &str) -> Result<(), CatalogError> {
        self.inner.utime(path).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn update_extended_attributes(&self, path: &str, attrs: ValueMap) -> Result<(), CatalogError> {
        self.inner.update_extended_attributes(path, attrs).await?;
        self.invalidate(&cache_key("stat", path)).await;
        Ok(())
    }

    async fn get_comment(&self, path: &str) -> Result<Option<String>, CatalogError> {
        let key = cache_key("comment", path);
        if let Some(bytes) = self.local.get(&key) {
            if let Ok(v) = serde_json::from_slice::<Option<String>>(&bytes) {
                return Ok(v);
            }
        }
        let value = self.inner.get_comment(path).await?;
        if let Ok(bytes) = serde_json::to_vec(&value) {
            self.local.set(&key, bytes.clone(), self.ttl);
            let _ = self.shared.set(&key, bytes, jitter(self.ttl)).await;
        }
        Ok(value)
    }

    async fn set_comment(&self, path: &str, comment: Option<String>) -> Result<(), CatalogError> {
        self.inner.set_comment(path, comment).await?;
        self.invalidate(&cache_key("comment", path)).await;
        Ok(())
    }

    async fn add_replica(&self, path: &str, replica: Replica) -> Result<Replica, CatalogError> {
        let r = self.inner.add_replica(path, replica).await?;
        self.invalidate(&cache_key("replicas", path)).await;
        Ok(r)
    }

    async fn update_replica(&self, replica: Replica) -> Result<(), CatalogError> {
        self.inner.update_replica(replica).await
    }

    async fn delete_replica(&self, path: &str, replica_id: ReplicaId) -> Result<(), CatalogError> {
        self.inner.delete_replica(path, replica_id).await?;
        self.invalidate(&cache_key("replicas", path)).await;
        Ok(())
    }

    async fn get_replicas(&self, path: &str) -> Result<Vec<Replica>, CatalogError> {
        let key = cache_key("replicas", path);
        let inner = self.inner.clone();
        let path_owned = path.to_owned();
        self.read_through(&key, move || async move { inner.get_replicas(&path_owned).await }).await
    }

    async fn pin_replica(&self, path: &str, replica_id: ReplicaId, pin_seconds: i64) -> Result<(), CatalogError> {
        self.inner.pin_replica(path, replica_id, pin_seconds).await?;
        self.invalidate(&cache_key("replicas", path)).await;
        Ok(())
    }

    async fn unpin_replica(&self, path: &str, replica_id: ReplicaId) -> Result<(), CatalogError> {
        self.inner.unpin_replica(path, replica_id).await?;
        self.invalidate(&cache_key("replicas", path)).await;
        Ok(())
    }

    async fn open_dir(&self, path: &str) -> Result<DirHandle, CatalogError> {
        // Directory handles are inherently stateful/one-shot; cached only
        // as the serialised child-name listing would be, not as a handle.
        self.inner.open_dir(path).await
    }

    async fn close_dir(&self, handle: &mut DirHandle) -> Result<(), CatalogError> {
        self.inner.close_dir(handle).await
    }
}

fn parent_of(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_owned(),
        Some(idx) => trimmed[..idx].to_owned(),
        None => "/".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_keys_are_not_hashed() {
        assert_eq!(cache_key("stat", "/a/b"), "stat:/a/b");
    }

    #[test]
    fn long_keys_are_hashed() {
        let long = "x".repeat(MAX_KEY_LEN + 1);
        let key = cache_key("stat", &long);
        assert!(key.starts_with("stat:"));
        assert_eq!(key.len(), "stat:".len() + 32);
    }

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent_of("/a/b/c"), "/a/b");
        assert_eq!(parent_of("/a"), "/");
        assert_eq!(parent_of("/"), "/");
    }
}
