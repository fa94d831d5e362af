//! `StackInstance`: the request-scoped arena described in §3/§9.
//!
//! Modeled as an `Rc`-owned arena (§9's "Cyclic ownership" note): the arena
//! holds strong references to its lazily-materialised components, and a
//! component that needs to call back into the arena (to read the current
//! `SecurityContext`, resolve a peer component, or touch the scratch area)
//! holds a `StackHandle` — a `Weak` back-reference bounded by the arena's
//! own lifetime, never an owning one. `StackInstance` is deliberately
//! `!Sync`: per §5, "a StackInstance is not thread-safe internally and must
//! be used from one thread at a time."

use crate::application::catalog::Catalog;
use crate::application::io::IODriver;
use crate::application::plugin_manager::PluginManager;
use crate::application::pool::PoolManager;
use crate::application::security_service::Authn;
use crate::domain::errors::MeridianError;
use crate::domain::inode::InodeId;
use crate::domain::security::SecurityContext;
use crate::domain::value::Value;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

pub const ROOT_INODE_ID: InodeId = 1;

struct StackInstanceInner {
    plugin_manager: Arc<PluginManager>,
    catalog: RefCell<Option<Arc<dyn Catalog>>>,
    pool_manager: RefCell<Option<Arc<dyn PoolManager>>>,
    io_driver: RefCell<Option<Arc<dyn IODriver>>>,
    authn: RefCell<Option<Arc<dyn Authn>>>,
    security_context: RefCell<Option<SecurityContext>>,
    cwd: RefCell<InodeId>,
    scratch: RefCell<HashMap<TypeId, Box<dyn Any>>>,
    config: RefCell<HashMap<String, Value>>,
}

/// A non-owning, `Weak`-backed reference to a `StackInstance`'s arena.
/// Held by decorator components so they can navigate peers without
/// extending the arena's lifetime.
#[derive(Clone)]
pub struct StackHandle(Weak<StackInstanceInner>);

impl StackHandle {
    fn upgrade(&self) -> Result<Rc<StackInstanceInner>, MeridianError> {
        self.0.upgrade().ok_or_else(|| MeridianError::Internal("stack instance has been torn down".into()))
    }

    pub fn security_context(&self) -> Result<Option<SecurityContext>, MeridianError> {
        Ok(self.upgrade()?.security_context.borrow().clone())
    }

    pub fn require_security_context(&self) -> Result<SecurityContext, MeridianError> {
        self.security_context()?.ok_or_else(|| MeridianError::Internal("no SecurityContext installed".into()))
    }

    pub fn cwd(&self) -> Result<InodeId, MeridianError> {
        Ok(*self.upgrade()?.cwd.borrow())
    }

    pub fn set_cwd(&self, inode: InodeId) -> Result<(), MeridianError> {
        *self.upgrade()?.cwd.borrow_mut() = inode;
        Ok(())
    }

    pub fn catalog(&self) -> Result<Arc<dyn Catalog>, MeridianError> {
        let inner = self.upgrade()?;
        if let Some(c) = inner.catalog.borrow().clone() {
            return Ok(c);
        }
        Err(MeridianError::Internal("catalog not yet materialised on this stack".into()))
    }

    pub fn pool_manager(&self) -> Result<Arc<dyn PoolManager>, MeridianError> {
        self.upgrade()?
            .pool_manager
            .borrow()
            .clone()
            .ok_or_else(|| MeridianError::Internal("pool manager not yet materialised".into()))
    }

    pub fn io_driver(&self) -> Result<Arc<dyn IODriver>, MeridianError> {
        self.upgrade()?
            .io_driver
            .borrow()
            .clone()
            .ok_or_else(|| MeridianError::Internal("io driver not yet materialised".into()))
    }

    pub fn config_value(&self, key: &str) -> Result<Option<Value>, MeridianError> {
        Ok(self.upgrade()?.config.borrow().get(key).cloned())
    }

    /// Scratch area: arbitrary per-component cross-cutting state (e.g. a
    /// profiler session id), keyed by the caller's own type.
    pub fn scratch_get<T: Clone + 'static>(&self) -> Result<Option<T>, MeridianError> {
        let inner = self.upgrade()?;
        let scratch = inner.scratch.borrow();
        Ok(scratch.get(&TypeId::of::<T>()).and_then(|b| b.downcast_ref::<T>()).cloned())
    }

    pub fn scratch_set<T: 'static>(&self, value: T) -> Result<(), MeridianError> {
        let inner = self.upgrade()?;
        inner.scratch.borrow_mut().insert(TypeId::of::<T>(), Box::new(value));
        Ok(())
    }
}

pub struct StackInstance {
    inner: Rc<StackInstanceInner>,
}

impl StackInstance {
    pub fn new(plugin_manager: Arc<PluginManager>) -> Self {
        StackInstance {
            inner: Rc::new(StackInstanceInner {
                plugin_manager,
                catalog: RefCell::new(None),
                pool_manager: RefCell::new(None),
                io_driver: RefCell::new(None),
                authn: RefCell::new(None),
                security_context: RefCell::new(None),
                cwd: RefCell::new(ROOT_INODE_ID),
                scratch: RefCell::new(HashMap::new()),
                config: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn handle(&self) -> StackHandle {
        StackHandle(Rc::downgrade(&self.inner))
    }

    pub fn plugin_manager(&self) -> &Arc<PluginManager> {
        &self.inner.plugin_manager
    }

    /// §4.1: lazily materialises one instance per interface kind by calling
    /// the front-of-list factory, then installs any already-set
    /// SecurityContext on it.
    pub fn catalog(&self) -> Result<Arc<dyn Catalog>, MeridianError> {
        if let Some(c) = self.inner.catalog.borrow().clone() {
            return Ok(c);
        }
        let c = self.inner.plugin_manager.clone().build_catalog(self)?;
        *self.inner.catalog.borrow_mut() = Some(c.clone());
        Ok(c)
    }

    pub fn pool_manager(&self) -> Result<Arc<dyn PoolManager>, MeridianError> {
        if let Some(p) = self.inner.pool_manager.borrow().clone() {
            return Ok(p);
        }
        let p = self.inner.plugin_manager.clone().build_pool_manager(self)?;
        *self.inner.pool_manager.borrow_mut() = Some(p.clone());
        Ok(p)
    }

    pub fn io_driver(&self) -> Result<Arc<dyn IODriver>, MeridianError> {
        if let Some(d) = self.inner.io_driver.borrow().clone() {
            return Ok(d);
        }
        let d = self.inner.plugin_manager.clone().build_io_driver(self)?;
        *self.inner.io_driver.borrow_mut() = Some(d.clone());
        Ok(d)
    }

    pub fn authn(&self) -> Result<Arc<dyn Authn>, MeridianError> {
        if let Some(a) = self.inner.authn.borrow().clone() {
            return Ok(a);
        }
        let a = self.inner.plugin_manager.clone().build_authn(self)?;
        *self.inner.authn.borrow_mut() = Some(a.clone());
        Ok(a)
    }

    /// §3/§9 invariant 7: every component within a stack instance observes
    /// the same SecurityContext.
    pub fn set_security_context(&self, ctx: SecurityContext) {
        *self.inner.security_context.borrow_mut() = Some(ctx);
    }

    pub fn security_context(&self) -> Option<SecurityContext> {
        self.inner.security_context.borrow().clone()
    }

    pub fn cwd(&self) -> InodeId {
        *self.inner.cwd.borrow()
    }

    pub fn set_cwd(&self, inode: InodeId) {
        *self.inner.cwd.borrow_mut() = inode;
    }

    pub fn set_config_value(&self, key: impl Into<String>, value: Value) {
        self.inner.config.borrow_mut().insert(key.into(), value);
    }

    pub fn config_value(&self, key: &str) -> Option<Value> {
        self.inner.config.borrow().get(key).cloned()
    }
}
