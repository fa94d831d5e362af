//! `PoolManager`/`PoolDriver`: pool enumeration, replica placement, and
//! pool-type dispatch (§4.5).
//!
//! Grounded on the teacher's `domain/storage.rs` `StorageProvider` trait
//! shape (async methods returning a leaf error, a `health_check`-style
//! availability probe), generalized from a single storage backend to a
//! named-pool-type dispatch table.

use crate::domain::errors::PoolError;
use crate::domain::location::Location;
use crate::domain::pool::{Availability, Pool};
use crate::domain::replica::{Replica, ReplicaStatus};
use crate::domain::value::Value;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait PoolManager: Send + Sync {
    fn impl_id(&self) -> String;

    async fn get_pools(&self, availability: Availability) -> Result<Vec<Pool>, PoolError>;
    async fn get_pool(&self, name: &str) -> Result<Pool, PoolError>;
    async fn new_pool(&self, pool: Pool) -> Result<(), PoolError>;
    async fn update_pool(&self, pool: Pool) -> Result<(), PoolError>;
    async fn delete_pool(&self, name: &str) -> Result<(), PoolError>;

    /// Resolves an LFN to one or more Chunks for reading, each carrying a
    /// signed capability token scoped to `user_id`.
    async fn where_to_read(&self, lfn: &str, replicas: &[Replica], user_id: &str) -> Result<Location, PoolError>;
    /// Selects a pool, computes a pfn, and issues a write token scoped to
    /// `user_id`.
    async fn where_to_write(&self, lfn: &str, pool_name: &str, user_id: &str) -> Result<(Location, Replica), PoolError>;
    async fn cancel_write(&self, location: &Location) -> Result<(), PoolError>;
    /// §9 Open Question (c): always backed by a real `stat` of the written
    /// pfn, never a size-0 fallback.
    async fn done_writing(&self, location: &Location, replica: &Replica) -> Result<Replica, PoolError>;
}

/// A driver bound to a specific pool (a "PoolHandler" in spec terms).
#[async_trait]
pub trait PoolDriver: Send + Sync {
    fn impl_id(&self) -> String;
    fn pool_type(&self) -> String;

    async fn total_space(&self, pool: &Pool) -> Result<u64, PoolError>;
    async fn free_space(&self, pool: &Pool) -> Result<u64, PoolError>;
    async fn is_available(&self, pool: &Pool, for_write: bool) -> Result<bool, PoolError>;
    /// §9 Open Question (b): probed per call for every backend, including
    /// S3/HDFS — the source gives no TTL or invalidation trigger that would
    /// make caching this correct.
    async fn replica_is_available(&self, replica: &Replica) -> Result<bool, PoolError>;

    async fn where_to_read(&self, pool: &Pool, replica: &Replica, user_id: &str) -> Result<Location, PoolError>;
    async fn where_to_write(&self, pool: &Pool, lfn: &str, user_id: &str) -> Result<(Location, Replica), PoolError>;
    async fn remove_replica(&self, pool: &Pool, replica: &Replica) -> Result<(), PoolError>;
    async fn cancel_write(&self, pool: &Pool, location: &Location) -> Result<(), PoolError>;
    async fn stat_pfn(&self, pool: &Pool, pfn: &str) -> Result<u64, PoolError>;
}

/// The key a `where_to_write`-returned `Location`'s chunks carry their
/// owning pool's name under, so a later `cancelWrite(location)` call — which
/// spec.md gives no replica to resolve a driver from — can still find one.
const POOL_NAME_KEY: &str = "pool_name";

fn location_pool_name(location: &Location) -> Option<String> {
    location.chunks().iter().find_map(|chunk| chunk.extra.get(POOL_NAME_KEY)).and_then(Value::as_str).map(str::to_owned)
}

/// Reference `PoolManager`: an in-memory pool table dispatching to whichever
/// `PoolDriver` is registered for a pool's `pool_type` (§4.5).
///
/// Grounded on `BuiltinCatalog` (`application/catalog.rs`): same shape of a
/// process-default implementation sitting next to the trait it satisfies,
/// delegating the actual I/O to a backend selected by a type tag rather than
/// doing I/O itself.
pub struct BuiltinPoolManager {
    pools: Mutex<HashMap<String, Pool>>,
    drivers: HashMap<String, Arc<dyn PoolDriver>>,
}

impl BuiltinPoolManager {
    /// `drivers` is keyed by `PoolType.0` (e.g. `"filesystem"`, `"s3"`);
    /// every pool whose `pool_type` isn't a key here fails lookups with
    /// `PoolError::NoSuchPool` once addressed rather than at construction,
    /// matching `get_pools`'s best-effort enumeration.
    pub fn new(pools: impl IntoIterator<Item = Pool>, drivers: HashMap<String, Arc<dyn PoolDriver>>) -> Self {
        let table = pools.into_iter().map(|p| (p.name.clone(), p)).collect();
        BuiltinPoolManager { pools: Mutex::new(table), drivers }
    }

    fn driver_for(&self, pool: &Pool) -> Result<Arc<dyn PoolDriver>, PoolError> {
        self.drivers
            .get(&pool.pool_type.0)
            .cloned()
            .ok_or_else(|| PoolError::Unavailable(format!("no driver registered for pool type {:?}", pool.pool_type.0)))
    }
}

#[async_trait]
impl PoolManager for BuiltinPoolManager {
    fn impl_id(&self) -> String {
        "Builtin".to_owned()
    }

    async fn get_pools(&self, availability: Availability) -> Result<Vec<Pool>, PoolError> {
        let candidates: Vec<Pool> = self.pools.lock().values().filter(|p| availability.matches(p.status)).cloned().collect();
        let mut out = Vec::with_capacity(candidates.len());
        for pool in candidates {
            let for_write = matches!(availability, Availability::Write | Availability::Both);
            let reachable = match self.driver_for(&pool) {
                Ok(driver) => driver.is_available(&pool, for_write).await.unwrap_or(false),
                Err(_) => false,
            };
            if reachable {
                out.push(pool);
            }
        }
        Ok(out)
    }

    async fn get_pool(&self, name: &str) -> Result<Pool, PoolError> {
        self.pools.lock().get(name).cloned().ok_or_else(|| PoolError::NoSuchPool(name.to_owned()))
    }

    async fn new_pool(&self, pool: Pool) -> Result<(), PoolError> {
        self.pools.lock().insert(pool.name.clone(), pool);
        Ok(())
    }

    async fn update_pool(&self, pool: Pool) -> Result<(), PoolError> {
        let mut table = self.pools.lock();
        if !table.contains_key(&pool.name) {
            return Err(PoolError::NoSuchPool(pool.name));
        }
        table.insert(pool.name.clone(), pool);
        Ok(())
    }

    async fn delete_pool(&self, name: &str) -> Result<(), PoolError> {
        self.pools.lock().remove(name).map(|_| ()).ok_or_else(|| PoolError::NoSuchPool(name.to_owned()))
    }

    async fn where_to_read(&self, lfn: &str, replicas: &[Replica], user_id: &str) -> Result<Location, PoolError> {
        for replica in replicas {
            let Ok(pool) = self.get_pool(&replica.pool_name).await else { continue };
            let Ok(driver) = self.driver_for(&pool) else { continue };
            if driver.replica_is_available(replica).await.unwrap_or(false) {
                return driver.where_to_read(&pool, replica, user_id).await;
            }
        }
        Err(PoolError::NoReplicas(lfn.to_owned()))
    }

    async fn where_to_write(&self, lfn: &str, pool_name: &str, user_id: &str) -> Result<(Location, Replica), PoolError> {
        let pool = self.get_pool(pool_name).await?;
        let driver = self.driver_for(&pool)?;
        let (mut location, mut replica) = driver.where_to_write(&pool, lfn, user_id).await?;
        replica.pool_name = pool_name.to_owned();
        for chunk in location.0.iter_mut() {
            chunk.extra.insert(POOL_NAME_KEY.to_owned(), Value::Str(pool_name.to_owned()));
        }
        Ok((location, replica))
    }

    async fn cancel_write(&self, location: &Location) -> Result<(), PoolError> {
        let pool_name = location_pool_name(location)
            .ok_or_else(|| PoolError::Unavailable("location carries no pool_name to resolve a driver from".into()))?;
        let pool = self.get_pool(&pool_name).await?;
        let driver = self.driver_for(&pool)?;
        driver.cancel_write(&pool, location).await
    }

    async fn done_writing(&self, _location: &Location, replica: &Replica) -> Result<Replica, PoolError> {
        let pool = self.get_pool(&replica.pool_name).await?;
        let driver = self.driver_for(&pool)?;
        // §9 Open Question (c): the real size always comes from stat_pfn,
        // never a 0 placeholder — the caller (Catalog::set_size) relies on
        // this to record the true replica size once a write completes.
        let size = driver.stat_pfn(&pool, &replica.pfn).await?;
        let mut finished = replica.clone();
        finished.status = ReplicaStatus::Available;
        finished.extra.insert("size".to_owned(), Value::U64(size));
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pool::PoolType;
    use crate::domain::replica::StorageKind;
    use chrono::Utc;
    use url::Url;

    struct StubDriver {
        pool_type: &'static str,
        available: bool,
        stat_size: u64,
    }

    #[async_trait]
    impl PoolDriver for StubDriver {
        fn impl_id(&self) -> String {
            "Stub".into()
        }
        fn pool_type(&self) -> String {
            self.pool_type.to_owned()
        }
        async fn total_space(&self, _pool: &Pool) -> Result<u64, PoolError> {
            Ok(1_000_000)
        }
        async fn free_space(&self, _pool: &Pool) -> Result<u64, PoolError> {
            Ok(500_000)
        }
        async fn is_available(&self, _pool: &Pool, _for_write: bool) -> Result<bool, PoolError> {
            Ok(self.available)
        }
        async fn replica_is_available(&self, _replica: &Replica) -> Result<bool, PoolError> {
            Ok(self.available)
        }
        async fn where_to_read(&self, _pool: &Pool, replica: &Replica, _user_id: &str) -> Result<Location, PoolError> {
            Ok(Location::single(crate::domain::location::Chunk {
                url: Url::parse(&format!("file:///{}", replica.pfn)).unwrap(),
                offset: 0,
                size: self.stat_size,
                extra: Default::default(),
            }))
        }
        async fn where_to_write(&self, _pool: &Pool, lfn: &str, _user_id: &str) -> Result<(Location, Replica), PoolError> {
            let now = Utc::now();
            let replica = Replica {
                id: 0,
                file_id: 0,
                storage_kind: StorageKind::Durable,
                status: ReplicaStatus::BeingPopulated,
                server: "stub".into(),
                pfn: format!("{lfn}.pfn"),
                pool_name: String::new(),
                filesystem: None,
                access_count: 0,
                create_time: now,
                access_time: now,
                pin_time: None,
                life_time: None,
                extra: Default::default(),
            };
            let loc = Location::single(crate::domain::location::Chunk {
                url: Url::parse(&format!("file:///{}", replica.pfn)).unwrap(),
                offset: 0,
                size: 0,
                extra: Default::default(),
            });
            Ok((loc, replica))
        }
        async fn remove_replica(&self, _pool: &Pool, _replica: &Replica) -> Result<(), PoolError> {
            Ok(())
        }
        async fn cancel_write(&self, _pool: &Pool, _location: &Location) -> Result<(), PoolError> {
            Ok(())
        }
        async fn stat_pfn(&self, _pool: &Pool, _pfn: &str) -> Result<u64, PoolError> {
            Ok(self.stat_size)
        }
    }

    fn manager(available: bool, stat_size: u64) -> BuiltinPoolManager {
        let pool = Pool::new("p1", PoolType::filesystem());
        let mut drivers: HashMap<String, Arc<dyn PoolDriver>> = HashMap::new();
        drivers.insert("filesystem".into(), Arc::new(StubDriver { pool_type: "filesystem", available, stat_size }));
        BuiltinPoolManager::new([pool], drivers)
    }

    #[tokio::test]
    async fn get_pools_filters_by_driver_availability() {
        let up = manager(true, 0);
        assert_eq!(up.get_pools(Availability::Any).await.unwrap().len(), 1);

        let down = manager(false, 0);
        assert!(down.get_pools(Availability::Write).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn where_to_write_stamps_pool_name_onto_replica_and_location() {
        let mgr = manager(true, 0);
        let (location, replica) = mgr.where_to_write("/f", "p1", "alice").await.unwrap();
        assert_eq!(replica.pool_name, "p1");
        assert_eq!(location_pool_name(&location).as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn cancel_write_resolves_driver_from_location_pool_name() {
        let mgr = manager(true, 0);
        let (location, _replica) = mgr.where_to_write("/f", "p1", "alice").await.unwrap();
        mgr.cancel_write(&location).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_write_without_pool_name_is_rejected() {
        let mgr = manager(true, 0);
        let loc = Location::single(crate::domain::location::Chunk {
            url: Url::parse("file:///tmp/x").unwrap(),
            offset: 0,
            size: 0,
            extra: Default::default(),
        });
        assert!(mgr.cancel_write(&loc).await.is_err());
    }

    #[tokio::test]
    async fn done_writing_always_stats_the_real_pfn() {
        let mgr = manager(true, 42);
        let replica = Replica {
            id: 1,
            file_id: 1,
            storage_kind: StorageKind::Durable,
            status: ReplicaStatus::BeingPopulated,
            server: "stub".into(),
            pfn: "/f.pfn".into(),
            pool_name: "p1".into(),
            filesystem: None,
            access_count: 0,
            create_time: Utc::now(),
            access_time: Utc::now(),
            pin_time: None,
            life_time: None,
            extra: Default::default(),
        };
        let finished = mgr.done_writing(&Location::single(crate::domain::location::Chunk {
            url: Url::parse("file:///f.pfn").unwrap(),
            offset: 0,
            size: 0,
            extra: Default::default(),
        }), &replica).await.unwrap();
        assert_eq!(finished.status, ReplicaStatus::Available);
        assert_eq!(finished.extra.get("size").and_then(Value::as_u64), Some(42));
    }

    #[tokio::test]
    async fn no_replicas_available_for_read_is_reported_precisely() {
        let mgr = manager(false, 0);
        let replica = Replica {
            id: 1,
            file_id: 1,
            storage_kind: StorageKind::Durable,
            status: ReplicaStatus::Available,
            server: "stub".into(),
            pfn: "/f.pfn".into(),
            pool_name: "p1".into(),
            filesystem: None,
            access_count: 0,
            create_time: Utc::now(),
            access_time: Utc::now(),
            pin_time: None,
            life_time: None,
            extra: Default::default(),
        };
        let err = mgr.where_to_read("/f", &[replica], "alice").await.unwrap_err();
        assert!(matches!(err, PoolError::NoReplicas(_)));
    }
}
