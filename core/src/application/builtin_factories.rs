//! Builtin `Factory<T>` implementations for every concrete backend this
//! crate ships (§4.1's "one factory function per interface, registered with
//! the plugin manager").
//!
//! Grounded on the teacher's `application/repository_factory.rs`: a
//! composition-root file, outside any binary's `main`, that turns already-
//! constructed concrete backends into the handles the rest of the
//! application wires together. There the selector was a `StorageBackend`
//! enum matched inside one function per repository; here each backend gets
//! its own `Factory<T>` struct instead, since `PluginManager` decorator
//! chaining (§4.1) needs a value it can register, order, and compose, not
//! just call once.
//!
//! None of these are wired into a `PluginManager` automatically — exactly
//! like the teacher's factory functions are never called from within
//! `core` itself (grep finds no caller in this pack), they're library
//! surface for whatever composition root assembles a deployment: the CLI's
//! `proc` command, the admin HTTP surface's startup code, or a `LoadPlugin`-
//! loaded `.so`'s own `extern "C"` entry point calling back into them.

use crate::application::catalog::{BuiltinCatalog, Catalog};
use crate::application::inode_store::InodeStore;
use crate::application::plugin_manager::Factory;
use crate::application::pool::{BuiltinPoolManager, PoolDriver, PoolManager};
use crate::application::security_service::{Authn, StaticAuthn};
use crate::application::stack::StackInstance;
use crate::domain::errors::PluginError;
use crate::domain::pool::Pool;
use std::collections::HashMap;
use std::sync::Arc;

/// Wraps an already-constructed `InodeStore` (in-memory or Postgres-backed)
/// in a `BuiltinCatalog`. Never wraps an inner `Catalog`: it's meant to sit
/// at the bottom of the decorator chain, underneath `CachingCatalog` or a
/// profiler decorator registered after it.
pub struct BuiltinCatalogFactory {
    store: Arc<dyn InodeStore>,
}

impl BuiltinCatalogFactory {
    pub fn new(store: Arc<dyn InodeStore>) -> Self {
        BuiltinCatalogFactory { store }
    }
}

impl Factory<dyn Catalog> for BuiltinCatalogFactory {
    fn impl_id(&self) -> String {
        "Builtin".to_owned()
    }

    fn configure(&self, _key: &str, _value: &str) -> Result<bool, PluginError> {
        Ok(false)
    }

    fn create(&self, stack: &StackInstance, inner: Option<Arc<dyn Catalog>>) -> Result<Arc<dyn Catalog>, PluginError> {
        if inner.is_some() {
            return Err(PluginError::UnknownOption("BuiltinCatalogFactory cannot wrap an inner catalog".into()));
        }
        Ok(Arc::new(BuiltinCatalog::new(self.store.clone(), stack.handle())))
    }
}

/// Registers a fixed DN→uid/gid table (built ahead of time by whatever read
/// the mapfile) as the stack's `Authn`.
pub struct StaticAuthnFactory {
    users: HashMap<String, (crate::domain::identity::UserInfo, crate::domain::identity::GroupInfo)>,
    default_uid: u32,
    default_gid: u32,
}

impl StaticAuthnFactory {
    pub fn new(default_uid: u32, default_gid: u32) -> Self {
        StaticAuthnFactory { users: HashMap::new(), default_uid, default_gid }
    }

    pub fn register(&mut self, dn: impl Into<String>, user: crate::domain::identity::UserInfo, group: crate::domain::identity::GroupInfo) {
        self.users.insert(dn.into(), (user, group));
    }
}

impl Factory<dyn Authn> for StaticAuthnFactory {
    fn impl_id(&self) -> String {
        "StaticAuthn".to_owned()
    }

    fn configure(&self, _key: &str, _value: &str) -> Result<bool, PluginError> {
        Ok(false)
    }

    fn create(&self, _stack: &StackInstance, inner: Option<Arc<dyn Authn>>) -> Result<Arc<dyn Authn>, PluginError> {
        if inner.is_some() {
            return Err(PluginError::UnknownOption("StaticAuthnFactory cannot wrap an inner Authn".into()));
        }
        let mut authn = StaticAuthn::new(self.default_uid, self.default_gid);
        for (dn, (user, group)) in &self.users {
            authn.register(dn.clone(), user.clone(), group.clone());
        }
        Ok(Arc::new(authn))
    }
}

/// Registers `BuiltinPoolManager` over a fixed pool table and a pool-type →
/// driver map, both supplied by the composition root (typically built from
/// the same config file's `Pool <name> <type> ...` directives this crate's
/// own config grammar doesn't yet parse structurally — see §9's "config
/// schema for pool definitions" open question, left to the embedder).
pub struct BuiltinPoolManagerFactory {
    pools: Vec<Pool>,
    drivers: HashMap<String, Arc<dyn PoolDriver>>,
}

impl BuiltinPoolManagerFactory {
    pub fn new(pools: Vec<Pool>, drivers: HashMap<String, Arc<dyn PoolDriver>>) -> Self {
        BuiltinPoolManagerFactory { pools, drivers }
    }
}

impl Factory<dyn PoolManager> for BuiltinPoolManagerFactory {
    fn impl_id(&self) -> String {
        "Builtin".to_owned()
    }

    fn configure(&self, _key: &str, _value: &str) -> Result<bool, PluginError> {
        Ok(false)
    }

    fn create(&self, _stack: &StackInstance, inner: Option<Arc<dyn PoolManager>>) -> Result<Arc<dyn PoolManager>, PluginError> {
        if inner.is_some() {
            return Err(PluginError::UnknownOption("BuiltinPoolManagerFactory cannot wrap an inner pool manager".into()));
        }
        Ok(Arc::new(BuiltinPoolManager::new(self.pools.clone(), self.drivers.clone())))
    }
}

/// One `Factory<dyn PoolDriver>` per already-constructed driver instance —
/// `PoolDriver`s are cheap, stateless wrappers around a root path, an
/// `opendal::Operator`, or a `reqwest::Client`, so there's no need for a
/// distinct factory struct per backend kind the way `PoolDriver` itself has
/// one impl per kind; this one just clones the `Arc` it was built from.
pub struct StaticPoolDriverFactory {
    driver: Arc<dyn PoolDriver>,
}

impl StaticPoolDriverFactory {
    pub fn new(driver: Arc<dyn PoolDriver>) -> Self {
        StaticPoolDriverFactory { driver }
    }
}

impl Factory<dyn PoolDriver> for StaticPoolDriverFactory {
    fn impl_id(&self) -> String {
        self.driver.impl_id()
    }

    fn configure(&self, _key: &str, _value: &str) -> Result<bool, PluginError> {
        Ok(false)
    }

    fn create(&self, _stack: &StackInstance, inner: Option<Arc<dyn PoolDriver>>) -> Result<Arc<dyn PoolDriver>, PluginError> {
        if inner.is_some() {
            return Err(PluginError::UnknownOption("StaticPoolDriverFactory cannot wrap an inner pool driver".into()));
        }
        Ok(self.driver.clone())
    }
}

/// Mirror of [`StaticPoolDriverFactory`] for `IODriver`.
pub struct StaticIoDriverFactory {
    driver: Arc<dyn crate::application::io::IODriver>,
}

impl StaticIoDriverFactory {
    pub fn new(driver: Arc<dyn crate::application::io::IODriver>) -> Self {
        StaticIoDriverFactory { driver }
    }
}

impl Factory<dyn crate::application::io::IODriver> for StaticIoDriverFactory {
    fn impl_id(&self) -> String {
        self.driver.impl_id()
    }

    fn configure(&self, _key: &str, _value: &str) -> Result<bool, PluginError> {
        Ok(false)
    }

    fn create(
        &self,
        _stack: &StackInstance,
        inner: Option<Arc<dyn crate::application::io::IODriver>>,
    ) -> Result<Arc<dyn crate::application::io::IODriver>, PluginError> {
        if inner.is_some() {
            return Err(PluginError::UnknownOption("StaticIoDriverFactory cannot wrap an inner io driver".into()));
        }
        Ok(self.driver.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::plugin_manager::PluginManager;
    use crate::domain::identity::{GroupInfo, UserInfo};
    use crate::infrastructure::inode::memory::MemoryInodeStore;

    #[test]
    fn builtin_catalog_factory_builds_a_usable_catalog() {
        let manager = PluginManager::new();
        manager.register_catalog_factory(Arc::new(BuiltinCatalogFactory::new(Arc::new(MemoryInodeStore::new()))));
        let stack = StackInstance::new(Arc::new(manager));
        let catalog = stack.catalog().unwrap();
        assert_eq!(catalog.impl_id(), "Builtin");
    }

    #[test]
    fn static_authn_factory_honours_registered_identities() {
        let mut factory = StaticAuthnFactory::new(99, 99);
        factory.register("/CN=bob", UserInfo::new(42, "bob"), GroupInfo::new(43, "vo-bob"));
        let manager = PluginManager::new();
        manager.register_authn_factory(Arc::new(factory));
        let stack = StackInstance::new(Arc::new(manager));
        let authn = stack.authn().unwrap();
        assert_eq!(authn.impl_id(), "StaticAuthn");
    }

    #[tokio::test]
    async fn builtin_pool_manager_factory_builds_a_usable_manager() {
        use crate::domain::pool::PoolType;

        let pool = Pool::new("p1", PoolType::filesystem());
        let dir = tempfile::TempDir::new().unwrap();
        let driver: Arc<dyn PoolDriver> =
            Arc::new(crate::infrastructure::pool::filesystem::FilesystemPoolDriver::new(dir.path(), b"secret".to_vec()));
        let mut drivers = HashMap::new();
        drivers.insert("filesystem".to_owned(), driver);

        let manager = PluginManager::new();
        manager.register_pool_manager_factory(Arc::new(BuiltinPoolManagerFactory::new(vec![pool], drivers)));
        let stack = StackInstance::new(Arc::new(manager));
        let pm = stack.pool_manager().unwrap();
        assert_eq!(pm.impl_id(), "Builtin");
        assert!(pm.get_pool("p1").await.is_ok());
    }
}
