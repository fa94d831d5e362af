//! Plugin registry and stack composition (§4.1).
//!
//! Grounded on the teacher's `application/repository_factory.rs` — a
//! factory function per interface, matched to a backend selector —
//! generalized from a fixed `match` over a `StorageBackend` enum into an
//! ordered, dynamically-extensible factory list per interface kind, so a
//! freshly loaded plugin can push itself to the front and wrap whatever
//! was registered before it (the decorator chaining spec.md describes).

use crate::application::catalog::Catalog;
use crate::application::io::IODriver;
use crate::application::pool::{PoolDriver, PoolManager};
use crate::application::security_service::Authn;
use crate::application::stack::StackInstance;
use crate::domain::errors::PluginError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// The compiled plugin ABI version. A loaded library's exported record must
/// match this exactly; mismatch fails with `ApiVersionMismatch`.
pub const API_VERSION: u32 = 1;
pub type PluginAbiVersion = u32;

/// A factory for interface `T`. Uniform across every interface kind
/// (`Authn`, `InodeStore`, `Catalog`, `PoolManager`, `PoolDriver`,
/// `IODriver`) so the registry and chain-building logic need not be
/// duplicated per interface.
pub trait Factory<T: ?Sized>: Send + Sync {
    /// Identifies this component in `/proc/stack` (§4.8) and in the
    /// scenario-1 `getImplId()` string ("Profiler over Cache over
    /// Builtin").
    fn impl_id(&self) -> String;

    /// Offered every (key, value) config pair; returns whether this
    /// factory recognised it. Unrecognised-everywhere pairs fail the whole
    /// config load with `UnknownOption` at the `PluginManager` level.
    fn configure(&self, key: &str, value: &str) -> Result<bool, PluginError>;

    /// Builds one instance, optionally wrapping the instance produced by
    /// the next factory in the (front-of-list-wins) chain.
    fn create(&self, stack: &StackInstance, inner: Option<Arc<T>>) -> Result<Arc<T>, PluginError>;
}

fn build_chain<T: ?Sized>(
    factories: &[Arc<dyn Factory<T>>],
    stack: &StackInstance,
) -> Result<Arc<T>, PluginError> {
    match factories.split_first() {
        None => Err(PluginError::NoFactory("<empty factory chain>".into())),
        Some((head, rest)) => {
            let inner = if rest.is_empty() { None } else { Some(build_chain(rest, stack)?) };
            head.create(stack, inner)
        }
    }
}

#[derive(Default)]
struct Registries {
    authn: Vec<Arc<dyn Factory<dyn Authn>>>,
    catalog: Vec<Arc<dyn Factory<dyn Catalog>>>,
    pool_manager: Vec<Arc<dyn Factory<dyn PoolManager>>>,
    pool_driver: HashMap<String, Vec<Arc<dyn Factory<dyn PoolDriver>>>>,
    io_driver: Vec<Arc<dyn Factory<dyn IODriver>>>,
}

/// Process-scoped registry of factories; lives from configuration load to
/// process exit (§3's PluginManager lifecycle note).
pub struct PluginManager {
    registries: Mutex<Registries>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        PluginManager { registries: Mutex::new(Registries::default()) }
    }

    pub fn register_authn_factory(&self, f: Arc<dyn Factory<dyn Authn>>) {
        self.registries.lock().authn.insert(0, f);
    }

    pub fn register_catalog_factory(&self, f: Arc<dyn Factory<dyn Catalog>>) {
        self.registries.lock().catalog.insert(0, f);
    }

    pub fn register_pool_manager_factory(&self, f: Arc<dyn Factory<dyn PoolManager>>) {
        self.registries.lock().pool_manager.insert(0, f);
    }

    pub fn register_pool_driver_factory(&self, pool_type: &str, f: Arc<dyn Factory<dyn PoolDriver>>) {
        self.registries.lock().pool_driver.entry(pool_type.to_owned()).or_default().insert(0, f);
    }

    pub fn register_io_driver_factory(&self, f: Arc<dyn Factory<dyn IODriver>>) {
        self.registries.lock().io_driver.insert(0, f);
    }

    pub fn build_authn(&self, stack: &StackInstance) -> Result<Arc<dyn Authn>, PluginError> {
        build_chain(&self.registries.lock().authn.clone(), stack)
    }

    pub fn build_catalog(&self, stack: &StackInstance) -> Result<Arc<dyn Catalog>, PluginError> {
        build_chain(&self.registries.lock().catalog.clone(), stack)
    }

    pub fn build_pool_manager(&self, stack: &StackInstance) -> Result<Arc<dyn PoolManager>, PluginError> {
        build_chain(&self.registries.lock().pool_manager.clone(), stack)
    }

    pub fn build_pool_driver(
        &self,
        pool_type: &str,
        stack: &StackInstance,
    ) -> Result<Arc<dyn PoolDriver>, PluginError> {
        let chain = self
            .registries
            .lock()
            .pool_driver
            .get(pool_type)
            .cloned()
            .ok_or_else(|| PluginError::NoFactory(format!("pool driver for type {pool_type:?}")))?;
        build_chain(&chain, stack)
    }

    pub fn build_io_driver(&self, stack: &StackInstance) -> Result<Arc<dyn IODriver>, PluginError> {
        build_chain(&self.registries.lock().io_driver.clone(), stack)
    }

    /// Scenario 1: `stack.getCatalog().getImplId()` after loading
    /// `inode_mysql`, `catalog_cache`, `profiler` should read
    /// `"Profiler over Cache over Builtin"`. Each decorator factory's
    /// `impl_id()` composes with its inner's at `create()` time (see
    /// `CachingCatalog`/`ProcCatalog`), not here; this registry only
    /// orders the factories front-to-back.
    pub fn catalog_factory_ids(&self) -> Vec<String> {
        self.registries.lock().catalog.iter().map(|f| f.impl_id()).collect()
    }

    /// Forwards one (key, value) config pair to every registered factory
    /// across every interface kind; accepts iff at least one recognised it
    /// (§4.1).
    pub fn configure(&self, key: &str, value: &str) -> Result<(), PluginError> {
        let regs = self.registries.lock();
        let mut recognised = false;
        for f in regs.authn.iter() {
            recognised |= f.configure(key, value)?;
        }
        for f in regs.catalog.iter() {
            recognised |= f.configure(key, value)?;
        }
        for f in regs.pool_manager.iter() {
            recognised |= f.configure(key, value)?;
        }
        for list in regs.pool_driver.values() {
            for f in list {
                recognised |= f.configure(key, value)?;
            }
        }
        for f in regs.io_driver.iter() {
            recognised |= f.configure(key, value)?;
        }
        if recognised {
            Ok(())
        } else {
            Err(PluginError::UnknownOption(key.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stack::StackInstance;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct IdOnlyCatalogFactory {
        id: &'static str,
    }

    struct TestCatalog {
        id: String,
    }

    fn unimplemented_catalog<T>() -> Result<T, crate::domain::errors::CatalogError> {
        Err(crate::domain::errors::CatalogError::InvalidArgument("not exercised by this test".into()))
    }

    #[async_trait::async_trait]
    impl Catalog for TestCatalog {
        fn impl_id(&self) -> String {
            self.id.clone()
        }

        async fn extended_stat(&self, _path: &str, _follow_sym: bool) -> Result<crate::domain::inode::INode, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn read_link(&self, _path: &str) -> Result<String, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn create(&self, _path: &str, _mode: u16) -> Result<crate::domain::inode::INode, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn make_dir(&self, _path: &str, _mode: u16) -> Result<crate::domain::inode::INode, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn symlink(&self, _path: &str, _target: &str) -> Result<crate::domain::inode::INode, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn unlink(&self, _path: &str) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn remove_dir(&self, _path: &str) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn rename(&self, _from: &str, _to: &str) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn set_mode(&self, _path: &str, _mode: u16) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn set_owner(
            &self,
            _path: &str,
            _uid: Option<crate::domain::identity::Uid>,
            _gid: Option<crate::domain::identity::Gid>,
        ) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn set_size(&self, _path: &str, _size: u64) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn set_checksum(&self, _path: &str, _checksum: crate::domain::inode::Checksum) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn set_acl(&self, _path: &str, _acl: crate::domain::acl::Acl) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn set_guid(&self, _path: &str, _guid: uuid::Uuid) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn utime(&self, _path: &str) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn update_extended_attributes(&self, _path: &str, _attrs: crate::domain::value::ValueMap) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn get_comment(&self, _path: &str) -> Result<Option<String>, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn set_comment(&self, _path: &str, _comment: Option<String>) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn add_replica(&self, _path: &str, _replica: crate::domain::replica::Replica) -> Result<crate::domain::replica::Replica, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn update_replica(&self, _replica: crate::domain::replica::Replica) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn delete_replica(&self, _path: &str, _replica_id: crate::domain::replica::ReplicaId) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn get_replicas(&self, _path: &str) -> Result<Vec<crate::domain::replica::Replica>, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn pin_replica(&self, _path: &str, _replica_id: crate::domain::replica::ReplicaId, _pin_seconds: i64) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn unpin_replica(&self, _path: &str, _replica_id: crate::domain::replica::ReplicaId) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn open_dir(&self, _path: &str) -> Result<crate::domain::dirent::DirHandle, crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
        async fn close_dir(&self, _handle: &mut crate::domain::dirent::DirHandle) -> Result<(), crate::domain::errors::CatalogError> {
            unimplemented_catalog()
        }
    }

    impl Factory<dyn Catalog> for IdOnlyCatalogFactory {
        fn impl_id(&self) -> String {
            self.id.into()
        }
        fn configure(&self, _key: &str, _value: &str) -> Result<bool, PluginError> {
            Ok(false)
        }
        fn create(&self, _stack: &StackInstance, inner: Option<Arc<dyn Catalog>>) -> Result<Arc<dyn Catalog>, PluginError> {
            let composed = match inner {
                Some(i) => format!("{} over {}", self.id, i.impl_id()),
                None => self.id.to_owned(),
            };
            Ok(Arc::new(TestCatalog { id: composed }))
        }
    }

    #[test]
    fn scenario_1_plugin_composition_order() {
        let mgr = PluginManager::new();
        // Registration order: inode_mysql (irrelevant), catalog_cache, profiler;
        // last-registered wraps its predecessors.
        mgr.register_catalog_factory(Arc::new(IdOnlyCatalogFactory { id: "Builtin" }));
        mgr.register_catalog_factory(Arc::new(IdOnlyCatalogFactory { id: "Cache" }));
        mgr.register_catalog_factory(Arc::new(IdOnlyCatalogFactory { id: "Profiler" }));

        let counter = AtomicUsize::new(0);
        let _ = counter.load(Ordering::Relaxed);
        let stack = StackInstance::new(Arc::new(PluginManager::new()));
        let catalog = mgr.build_catalog(&stack).unwrap();
        assert_eq!(catalog.impl_id(), "Profiler over Cache over Builtin");
    }
}
