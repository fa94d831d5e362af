//! `Catalog`: path-resolving, permission-checked namespace operations built
//! on `InodeStore` (§4.3).
//!
//! `BuiltinCatalog` is grounded on the teacher's `domain/fsal.rs`
//! `AegisFSAL` (`authorize` → sanitize path → enforce policy → delegate →
//! publish event method shape), generalized from the FSAL's flat
//! volume-relative jail to full hierarchical path resolution, and using
//! `domain::security::check_permissions` (itself grounded on
//! `security_context.rs`'s `evaluate()` precedence chain) in place of the
//! FSAL's allowlist-pattern policy.

use crate::application::inode_store::InodeStore;
use crate::application::stack::StackHandle;
use crate::domain::acl::Acl;
use crate::domain::dirent::{DirEntry, DirEntryX, DirHandle};
use crate::domain::errors::CatalogError;
use crate::domain::events::CatalogEvent;
use crate::domain::identity::{Gid, Uid};
use crate::domain::inode::{Checksum, FileStatus, FileType, INode, InodeId};
use crate::domain::path::{self, Component, DEFAULT_SYMLINK_DEPTH};
use crate::domain::replica::{Replica, ReplicaId};
use crate::domain::security::{self, PermissionSubject, MODE_EXEC, MODE_READ, MODE_WRITE};
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Capability trait surface every `Catalog` implementation exposes.
/// §9: "shared interface surface should be a sum of capability traits, not
/// a single fat interface" — kept as one trait here since every method is
/// genuinely path-resolution-shaped and every backend in this crate
/// implements all of them, but the method set is additive-only so a future
/// split stays source-compatible.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Identifies this component, composed with its inner delegate's id by
    /// decorators (scenario 1: `"Profiler over Cache over Builtin"`).
    fn impl_id(&self) -> String;

    async fn extended_stat(&self, path: &str, follow_sym: bool) -> Result<INode, CatalogError>;
    async fn read_link(&self, path: &str) -> Result<String, CatalogError>;

    async fn create(&self, path: &str, mode: u16) -> Result<INode, CatalogError>;
    async fn make_dir(&self, path: &str, mode: u16) -> Result<INode, CatalogError>;
    async fn symlink(&self, path: &str, target: &str) -> Result<INode, CatalogError>;
    async fn unlink(&self, path: &str) -> Result<(), CatalogError>;
    async fn remove_dir(&self, path: &str) -> Result<(), CatalogError>;
    async fn rename(&self, from: &str, to: &str) -> Result<(), CatalogError>;

    async fn set_mode(&self, path: &str, mode: u16) -> Result<(), CatalogError>;
    async fn set_owner(&self, path: &str, uid: Option<Uid>, gid: Option<Gid>) -> Result<(), CatalogError>;
    async fn set_size(&self, path: &str, size: u64) -> Result<(), CatalogError>;
    async fn set_checksum(&self, path: &str, checksum: Checksum) -> Result<(), CatalogError>;
    async fn set_acl(&self, path: &str, acl: Acl) -> Result<(), CatalogError>;
    async fn set_guid(&self, path: &str, guid: Uuid) -> Result<(), CatalogError>;
    async fn utime(&self, path: &str) -> Result<(), CatalogError>;
    async fn update_extended_attributes(&self, path: &str, attrs: ValueMap) -> Result<(), CatalogError>;

    async fn get_comment(&self, path: &str) -> Result<Option<String>, CatalogError>;
    async fn set_comment(&self, path: &str, comment: Option<String>) -> Result<(), CatalogError>;

    async fn add_replica(&self, path: &str, replica: Replica) -> Result<Replica, CatalogError>;
    async fn update_replica(&self, replica: Replica) -> Result<(), CatalogError>;
    async fn delete_replica(&self, path: &str, replica_id: ReplicaId) -> Result<(), CatalogError>;
    async fn get_replicas(&self, path: &str) -> Result<Vec<Replica>, CatalogError>;
    /// §SUPPLEMENTED 3.
    async fn pin_replica(&self, path: &str, replica_id: ReplicaId, pin_seconds: i64) -> Result<(), CatalogError>;
    async fn unpin_replica(&self, path: &str, replica_id: ReplicaId) -> Result<(), CatalogError>;

    async fn open_dir(&self, path: &str) -> Result<DirHandle, CatalogError>;
    async fn close_dir(&self, handle: &mut DirHandle) -> Result<(), CatalogError>;
}

pub struct BuiltinCatalog {
    store: Arc<dyn InodeStore>,
    stack: StackHandle,
    symlink_depth: u32,
}

impl BuiltinCatalog {
    pub fn new(store: Arc<dyn InodeStore>, stack: StackHandle) -> Self {
        BuiltinCatalog { store, stack, symlink_depth: DEFAULT_SYMLINK_DEPTH }
    }

    fn ctx(&self) -> Result<crate::domain::security::SecurityContext, CatalogError> {
        self.stack
            .require_security_context()
            .map_err(|e| CatalogError::Permission(e.to_string()))
    }

    fn start_inode(&self, path: &str) -> Result<InodeId, CatalogError> {
        if path::is_absolute(path) {
            Ok(crate::application::stack::ROOT_INODE_ID)
        } else {
            self.stack.cwd().map_err(|e| CatalogError::Permission(e.to_string()))
        }
    }

    fn check(&self, inode: &INode, requested: u8) -> Result<(), CatalogError> {
        let ctx = self.ctx()?;
        let subject = PermissionSubject { uid: inode.uid, gid: inode.gid, mode: inode.mode };
        security::check_permissions(&ctx, &inode.acl, &subject, requested).map_err(|_| {
            CatalogError::Permission(format!("permission denied on inode {} (requested {:#05o})", inode.id, requested))
        })
    }

    /// Walks `path`'s components from `start`, resolving `.`/`..` and
    /// following symlinks up to `self.symlink_depth` hops, requiring
    /// execute permission on every intermediate directory (§4.3).
    async fn resolve(&self, path: &str, follow_last_sym: bool) -> Result<INode, CatalogError> {
        let mut current = self.store.stat(self.start_inode(path)?).await?;
        let components = path::split(path);
        let last_idx = components.len().saturating_sub(1);

        for (idx, comp) in components.iter().enumerate() {
            match comp {
                Component::CurDir => continue,
                Component::ParentDir => {
                    current = match current.parent_id {
                        Some(pid) => self.store.stat(pid).await?,
                        None => current,
                    };
                }
                Component::Named(name) => {
                    if !current.is_dir() {
                        return Err(CatalogError::NotDirectory(path.to_owned()));
                    }
                    self.check(&current, MODE_EXEC)?;
                    current = self.store.stat_by_name(current.id, name).await?;
                    let is_last = idx == last_idx;
                    if current.is_symlink() && (!is_last || follow_last_sym) {
                        current = self.follow_symlink(&current, path, 0).await?;
                    }
                }
            }
        }
        Ok(current)
    }

    /// Boxed via manual recursion limit (async fn cannot recurse directly
    /// without boxing); unrolled as an explicit loop instead.
    async fn follow_symlink(&self, start: &INode, original_path: &str, _depth: u32) -> Result<INode, CatalogError> {
        let mut node = start.clone();
        let mut hops = 0u32;
        while node.is_symlink() {
            if hops >= self.symlink_depth {
                return Err(CatalogError::TooManySymlinks(original_path.to_owned()));
            }
            let target = self.store.read_link(node.id).await?;
            let target_start = if path::is_absolute(&target) {
                crate::application::stack::ROOT_INODE_ID
            } else {
                node.parent_id.unwrap_or(crate::application::stack::ROOT_INODE_ID)
            };
            let mut cur = self.store.stat(target_start).await?;
            for comp in path::split(&target) {
                match comp {
                    Component::CurDir => {}
                    Component::ParentDir => {
                        cur = match cur.parent_id {
                            Some(pid) => self.store.stat(pid).await?,
                            None => cur,
                        };
                    }
                    Component::Named(name) => {
                        self.check(&cur, MODE_EXEC)?;
                        cur = self.store.stat_by_name(cur.id, &name).await?;
                    }
                }
            }
            node = cur;
            hops += 1;
        }
        Ok(node)
    }

    async fn resolve_parent_and_name<'a>(&self, path: &'a str) -> Result<(INode, String), CatalogError> {
        let trimmed = path.trim_end_matches('/');
        let (parent_path, name) = match trimmed.rfind('/') {
            Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
            None => ("", trimmed),
        };
        if name.is_empty() {
            return Err(CatalogError::InvalidArgument("empty path component".into()));
        }
        let parent_path = if parent_path.is_empty() { "/" } else { parent_path };
        let parent = self.resolve(parent_path, true).await?;
        Ok((parent, name.to_owned()))
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
impl Catalog for BuiltinCatalog {
    fn impl_id(&self) -> String {
        "Builtin".to_owned()
    }

    async fn extended_stat(&self, path: &str, follow_sym: bool) -> Result<INode, CatalogError> {
        self.resolve(path, follow_sym).await
    }

    async fn read_link(&self, path: &str) -> Result<String, CatalogError> {
        let node = self.resolve(path, false).await?;
        if !node.is_symlink() {
            return Err(CatalogError::InvalidArgument(format!("{path} is not a symlink")));
        }
        self.store.read_link(node.id).await
    }

    async fn create(&self, path: &str, mode: u16) -> Result<INode, CatalogError> {
        let (parent, name) = self.resolve_parent_and_name(path).await?;
        self.check(&parent, MODE_WRITE | MODE_EXEC)?;
        let ctx = self.ctx()?;
        let (inherited_acl, inherited_mode) = Acl::inherit(&parent.acl, ctx.user.uid, ctx.primary_group.gid, false, mode);
        let node = self
            .store
            .create(
                parent.id,
                &name,
                ctx.user.uid,
                ctx.primary_group.gid,
                inherited_mode,
                0,
                FileType::Regular,
                FileStatus::Online,
                None,
                inherited_acl,
            )
            .await?;
        tracing::debug!(path, inode = node.id, "catalog: created file");
        Ok(node)
    }

    async fn make_dir(&self, path: &str, mode: u16) -> Result<INode, CatalogError> {
        let (parent, name) = self.resolve_parent_and_name(path).await?;
        self.check(&parent, MODE_WRITE | MODE_EXEC)?;
        let ctx = self.ctx()?;
        let (inherited_acl, inherited_mode) = Acl::inherit(&parent.acl, ctx.user.uid, ctx.primary_group.gid, true, mode);
        let node = self
            .store
            .create(
                parent.id,
                &name,
                ctx.user.uid,
                ctx.primary_group.gid,
                inherited_mode,
                0,
                FileType::Directory,
                FileStatus::Online,
                None,
                inherited_acl,
            )
            .await?;
        Ok(node)
    }

    async fn symlink(&self, path: &str, target: &str) -> Result<INode, CatalogError> {
        let (parent, name) = self.resolve_parent_and_name(path).await?;
        self.check(&parent, MODE_WRITE | MODE_EXEC)?;
        let ctx = self.ctx()?;
        let node = self
            .store
            .create(
                parent.id,
                &name,
                ctx.user.uid,
                ctx.primary_group.gid,
                0o777,
                0,
                FileType::Symlink,
                FileStatus::Online,
                None,
                Acl::default(),
            )
            .await?;
        self.store.symlink(node.id, target).await?;
        Ok(node)
    }

    async fn unlink(&self, path: &str) -> Result<(), CatalogError> {
        let node = self.resolve(path, false).await?;
        if node.is_dir() {
            return Err(CatalogError::IsDirectory(path.to_owned()));
        }
        let parent = self.store.stat(node.parent_id.ok_or_else(|| CatalogError::NoSuchFile(path.to_owned()))?).await?;
        self.check(&parent, MODE_WRITE | MODE_EXEC)?;
        let replicas = self.store.get_replicas(node.id).await?;
        let now = Self::now();
        if replicas.iter().any(|r| !r.is_deletable(now)) {
            return Err(CatalogError::Permission(format!("{path} has replicas that cannot be deleted right now")));
        }
        let tx = self.store.begin().await?;
        if let Err(e) = self.store.unlink(node.id).await {
            tx.rollback().await?;
            return Err(e);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<(), CatalogError> {
        let node = self.resolve(path, false).await?;
        if !node.is_dir() {
            return Err(CatalogError::NotDirectory(path.to_owned()));
        }
        let parent_id = node.parent_id.ok_or_else(|| CatalogError::Permission("cannot remove root".into()))?;
        let parent = self.store.stat(parent_id).await?;
        self.check(&parent, MODE_WRITE | MODE_EXEC)?;
        let children = self.store.open_dir(node.id).await?;
        if !children.is_empty() {
            return Err(CatalogError::NotEmpty(path.to_owned()));
        }
        self.store.unlink(node.id).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), CatalogError> {
        let node = self.resolve(from, false).await?;
        let (old_parent, (new_parent, new_name)) = (
            self.store.stat(node.parent_id.ok_or_else(|| CatalogError::NoSuchFile(from.to_owned()))?).await?,
            self.resolve_parent_and_name(to).await?,
        );
        self.check(&old_parent, MODE_WRITE | MODE_EXEC)?;
        self.check(&new_parent, MODE_WRITE | MODE_EXEC)?;

        if node.is_dir() {
            let mut cursor = Some(new_parent.id);
            while let Some(id) = cursor {
                if id == node.id {
                    return Err(CatalogError::WouldCreateCycle);
                }
                cursor = self.store.stat(id).await.ok().and_then(|n| n.parent_id);
            }
        }

        let tx = self.store.begin().await?;
        if new_parent.id != old_parent.id {
            if let Err(e) = self.store.move_inode(node.id, new_parent.id).await {
                tx.rollback().await?;
                return Err(e);
            }
        }
        if new_name != node.name {
            if let Err(e) = self.store.rename_inode(node.id, &new_name).await {
                tx.rollback().await?;
                return Err(e);
            }
        }
        tx.commit().await
    }

    async fn set_mode(&self, path: &str, mode: u16) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        self.store.set_mode(node.id, mode).await
    }

    async fn set_owner(&self, path: &str, uid: Option<Uid>, gid: Option<Gid>) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        let ctx = self.ctx()?;
        if uid.is_some() && uid != Some(node.uid) && !ctx.is_root() {
            return Err(CatalogError::Permission("only root may chown across users".into()));
        }
        self.require_owner_or_write(&node)?;
        self.store.set_owner(node.id, uid.unwrap_or(node.uid), gid.unwrap_or(node.gid)).await
    }

    async fn set_size(&self, path: &str, size: u64) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        self.store.set_size(node.id, size).await
    }

    async fn set_checksum(&self, path: &str, checksum: Checksum) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        self.store.set_checksum(node.id, checksum).await
    }

    async fn set_acl(&self, path: &str, acl: Acl) -> Result<(), CatalogError> {
        acl.validate().map_err(|e| CatalogError::InvalidAcl(e.to_string()))?;
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        self.store.set_acl(node.id, acl).await
    }

    async fn set_guid(&self, path: &str, guid: Uuid) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        self.store.set_guid(node.id, guid).await
    }

    async fn utime(&self, path: &str) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        let now = Self::now();
        self.store.utime(node.id, now, now).await
    }

    async fn update_extended_attributes(&self, path: &str, attrs: ValueMap) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        self.store.update_xattrs(node.id, attrs).await
    }

    async fn get_comment(&self, path: &str) -> Result<Option<String>, CatalogError> {
        let node = self.resolve(path, true).await?;
        self.check(&node, MODE_READ)?;
        self.store.get_comment(node.id).await
    }

    async fn set_comment(&self, path: &str, comment: Option<String>) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        self.store.set_comment(node.id, comment).await
    }

    async fn add_replica(&self, path: &str, replica: Replica) -> Result<Replica, CatalogError> {
        let node = self.resolve(path, true).await?;
        self.check(&node, MODE_WRITE)?;
        let mut replica = replica;
        replica.file_id = node.id;
        self.store.add_replica(replica).await
    }

    async fn update_replica(&self, replica: Replica) -> Result<(), CatalogError> {
        self.store.update_replica(replica).await
    }

    async fn delete_replica(&self, path: &str, replica_id: ReplicaId) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.require_owner_or_write(&node)?;
        let replicas = self.store.get_replicas(node.id).await?;
        let target = replicas
            .iter()
            .find(|r| r.id == replica_id)
            .ok_or_else(|| CatalogError::NoSuchFile(format!("replica {replica_id}")))?;
        if !target.is_deletable(Self::now()) {
            return Err(CatalogError::Permission(format!("replica {replica_id} is pinned")));
        }
        self.store.delete_replica(replica_id).await
    }

    async fn get_replicas(&self, path: &str) -> Result<Vec<Replica>, CatalogError> {
        let node = self.resolve(path, true).await?;
        self.check(&node, MODE_READ)?;
        self.store.get_replicas(node.id).await
    }

    async fn pin_replica(&self, path: &str, replica_id: ReplicaId, pin_seconds: i64) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.check(&node, MODE_WRITE)?;
        let mut replicas = self.store.get_replicas(node.id).await?;
        let r = replicas
            .iter_mut()
            .find(|r| r.id == replica_id)
            .ok_or_else(|| CatalogError::NoSuchFile(format!("replica {replica_id}")))?;
        r.pin_time = Some(Self::now() + chrono::Duration::seconds(pin_seconds));
        self.store.update_replica(r.clone()).await
    }

    async fn unpin_replica(&self, path: &str, replica_id: ReplicaId) -> Result<(), CatalogError> {
        let node = self.resolve(path, true).await?;
        self.check(&node, MODE_WRITE)?;
        let mut replicas = self.store.get_replicas(node.id).await?;
        let r = replicas
            .iter_mut()
            .find(|r| r.id == replica_id)
            .ok_or_else(|| CatalogError::NoSuchFile(format!("replica {replica_id}")))?;
        r.pin_time = None;
        self.store.update_replica(r.clone()).await
    }

    async fn open_dir(&self, path: &str) -> Result<DirHandle, CatalogError> {
        let node = self.resolve(path, true).await?;
        if !node.is_dir() {
            return Err(CatalogError::NotDirectory(path.to_owned()));
        }
        self.check(&node, MODE_READ | MODE_EXEC)?;
        let entries = self.store.open_dir(node.id).await?;
        Ok(DirHandle::new(node.id, entries))
    }

    async fn close_dir(&self, handle: &mut DirHandle) -> Result<(), CatalogError> {
        handle.close()
    }
}

impl BuiltinCatalog {
    fn require_owner_or_write(&self, node: &INode) -> Result<(), CatalogError> {
        let ctx = self.ctx()?;
        if ctx.is_root() || ctx.user.uid == node.uid {
            return Ok(());
        }
        self.check(node, MODE_WRITE)
    }
}

/// Materializes `DirEntry`/`DirEntryX` pairs for a directory, exposed as a
/// free function so both `BuiltinCatalog` and the cache overlay's
/// directory-listing cache can share the shape.
pub fn entries_to_names(entries: &[DirEntryX]) -> Vec<DirEntry> {
    entries.iter().map(|e| e.entry.clone()).collect()
}

/// Records a catalog mutation as an audit event (used by decorators that
/// want to publish one without depending on `BuiltinCatalog` directly).
pub fn access_denied_event(path: &str, uid: Uid, requested: u8) -> CatalogEvent {
    CatalogEvent::AccessDenied { path: path.to_owned(), uid, requested, at: Utc::now() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::plugin_manager::PluginManager;
    use crate::application::stack::StackInstance;
    use crate::domain::security::{SecurityContext, SecurityCredentials};
    use crate::domain::identity::{GroupInfo, UserInfo};
    use crate::infrastructure::inode::memory::MemoryInodeStore;

    fn ctx(uid: Uid, gid: Gid) -> SecurityContext {
        SecurityContext {
            user: UserInfo::new(uid, format!("u{uid}")),
            primary_group: GroupInfo::new(gid, format!("g{gid}")),
            groups: vec![],
            credentials: SecurityCredentials {
                mechanism: "x509".into(),
                client_name: format!("/CN=u{uid}"),
                remote_address: "127.0.0.1".into(),
                fqans: vec![],
                session_id: None,
            },
        }
    }

    /// A `BuiltinCatalog` over a fresh `MemoryInodeStore`, plus the
    /// `StackInstance` that owns it (kept alive so the catalog's
    /// `StackHandle` stays upgradeable).
    fn harness(uid: Uid, gid: Gid) -> (StackInstance, BuiltinCatalog) {
        let stack = StackInstance::new(Arc::new(PluginManager::new()));
        stack.set_security_context(ctx(uid, gid));
        let store: Arc<dyn InodeStore> = Arc::new(MemoryInodeStore::new());
        let catalog = BuiltinCatalog::new(store, stack.handle());
        (stack, catalog)
    }

    #[tokio::test]
    async fn root_exists_and_is_a_directory() {
        let (_stack, catalog) = harness(0, 0);
        let root = catalog.extended_stat("/", true).await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn create_then_stat_round_trips() {
        let (_stack, catalog) = harness(0, 0);
        let created = catalog.create("/a.txt", 0o644).await.unwrap();
        let fetched = catalog.extended_stat("/a.txt", true).await.unwrap();
        assert_eq!(created.id, fetched.id);
        assert_eq!(fetched.uid, 0);
        assert_eq!(fetched.mode, 0o644);
    }

    #[tokio::test]
    async fn create_denied_without_write_on_parent() {
        let store: Arc<dyn InodeStore> = Arc::new(MemoryInodeStore::new());
        let admin_stack = StackInstance::new(Arc::new(PluginManager::new()));
        admin_stack.set_security_context(ctx(0, 0));
        let admin_catalog = BuiltinCatalog::new(store.clone(), admin_stack.handle());
        admin_catalog.set_mode("/", 0o555).await.unwrap();

        let user_stack = StackInstance::new(Arc::new(PluginManager::new()));
        user_stack.set_security_context(ctx(100, 100));
        let user_catalog = BuiltinCatalog::new(store, user_stack.handle());
        let err = user_catalog.create("/x.txt", 0o644).await.unwrap_err();
        assert!(matches!(err, CatalogError::Permission(_)));
    }

    #[tokio::test]
    async fn make_dir_and_nested_resolution() {
        let (_stack, catalog) = harness(0, 0);
        catalog.make_dir("/d", 0o755).await.unwrap();
        catalog.create("/d/inner.txt", 0o644).await.unwrap();
        let stat = catalog.extended_stat("/d/inner.txt", true).await.unwrap();
        assert_eq!(stat.name, "inner.txt");
    }

    #[tokio::test]
    async fn relative_path_resolves_against_cwd() {
        let (stack, catalog) = harness(0, 0);
        let dir = catalog.make_dir("/d", 0o755).await.unwrap();
        stack.set_cwd(dir.id);
        catalog.create("rel.txt", 0o644).await.unwrap();
        let stat = catalog.extended_stat("/d/rel.txt", true).await.unwrap();
        assert_eq!(stat.name, "rel.txt");
    }

    #[tokio::test]
    async fn unlink_refuses_directories() {
        let (_stack, catalog) = harness(0, 0);
        catalog.make_dir("/d", 0o755).await.unwrap();
        let err = catalog.unlink("/d").await.unwrap_err();
        assert!(matches!(err, CatalogError::IsDirectory(_)));
    }

    #[tokio::test]
    async fn unlink_removes_a_file() {
        let (_stack, catalog) = harness(0, 0);
        catalog.create("/a.txt", 0o644).await.unwrap();
        catalog.unlink("/a.txt").await.unwrap();
        let err = catalog.extended_stat("/a.txt", true).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoSuchFile(_)));
    }

    #[tokio::test]
    async fn remove_dir_refuses_non_empty() {
        let (_stack, catalog) = harness(0, 0);
        catalog.make_dir("/d", 0o755).await.unwrap();
        catalog.create("/d/f", 0o644).await.unwrap();
        let err = catalog.remove_dir("/d").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotEmpty(_)));
    }

    #[tokio::test]
    async fn remove_dir_succeeds_when_empty() {
        let (_stack, catalog) = harness(0, 0);
        catalog.make_dir("/d", 0o755).await.unwrap();
        catalog.remove_dir("/d").await.unwrap();
        let err = catalog.extended_stat("/d", true).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoSuchFile(_)));
    }

    #[tokio::test]
    async fn rename_refuses_moving_directory_into_its_own_descendant() {
        let (_stack, catalog) = harness(0, 0);
        catalog.make_dir("/a", 0o755).await.unwrap();
        catalog.make_dir("/a/b", 0o755).await.unwrap();
        let err = catalog.rename("/a", "/a/b/a").await.unwrap_err();
        assert!(matches!(err, CatalogError::WouldCreateCycle));
    }

    #[tokio::test]
    async fn rename_moves_and_renames() {
        let (_stack, catalog) = harness(0, 0);
        catalog.make_dir("/a", 0o755).await.unwrap();
        catalog.make_dir("/b", 0o755).await.unwrap();
        catalog.create("/a/f", 0o644).await.unwrap();
        catalog.rename("/a/f", "/b/g").await.unwrap();
        assert!(catalog.extended_stat("/a/f", true).await.is_err());
        let moved = catalog.extended_stat("/b/g", true).await.unwrap();
        assert_eq!(moved.name, "g");
    }

    #[tokio::test]
    async fn symlink_loop_exceeds_depth() {
        let (_stack, catalog) = harness(0, 0);
        catalog.symlink("/a", "/b").await.unwrap();
        catalog.symlink("/b", "/a").await.unwrap();
        let err = catalog.extended_stat("/a", true).await.unwrap_err();
        assert!(matches!(err, CatalogError::TooManySymlinks(_)));
    }

    #[tokio::test]
    async fn symlink_not_followed_when_follow_sym_false() {
        let (_stack, catalog) = harness(0, 0);
        catalog.create("/target", 0o644).await.unwrap();
        catalog.symlink("/link", "/target").await.unwrap();
        let stat = catalog.extended_stat("/link", false).await.unwrap();
        assert!(stat.is_symlink());
        let target = catalog.read_link("/link").await.unwrap();
        assert_eq!(target, "/target");
    }

    #[tokio::test]
    async fn set_owner_across_users_requires_root() {
        let store: Arc<dyn InodeStore> = Arc::new(MemoryInodeStore::new());
        let admin_stack = StackInstance::new(Arc::new(PluginManager::new()));
        admin_stack.set_security_context(ctx(0, 0));
        let admin_catalog = BuiltinCatalog::new(store.clone(), admin_stack.handle());
        admin_catalog.create("/f", 0o644).await.unwrap();

        // non-root, non-owner caller attempting to chown must fail.
        let other_stack = StackInstance::new(Arc::new(PluginManager::new()));
        other_stack.set_security_context(ctx(200, 200));
        let other_catalog = BuiltinCatalog::new(store.clone(), other_stack.handle());
        let err = other_catalog.set_owner("/f", Some(300), None).await.unwrap_err();
        assert!(matches!(err, CatalogError::Permission(_)));

        // root may chown across users.
        admin_catalog.set_owner("/f", Some(300), Some(300)).await.unwrap();
        let stat = admin_catalog.extended_stat("/f", true).await.unwrap();
        assert_eq!(stat.uid, 300);
        assert_eq!(stat.gid, 300);
    }

    #[tokio::test]
    async fn acl_default_entries_are_inherited_on_create() {
        use crate::domain::acl::{Acl, AclBaseType, AclEntry};
        let (_stack, catalog) = harness(0, 0);
        let parent_acl = Acl::new(vec![
            AclEntry::new(AclBaseType::UserObj, true, 0, 7),
            AclEntry::new(AclBaseType::GroupObj, true, 0, 5),
            AclEntry::new(AclBaseType::Other, true, 0, 0),
        ]);
        catalog.make_dir("/d", 0o755).await.unwrap();
        catalog.set_acl("/d", parent_acl).await.unwrap();
        let child = catalog.create("/d/f", 0o644).await.unwrap();
        assert!(!child.acl.entries().is_empty());
        assert!(child.acl.validate().is_ok());
    }

    #[tokio::test]
    async fn get_replicas_and_add_replica_round_trip() {
        use crate::domain::replica::{Replica, ReplicaStatus, StorageKind};
        let (_stack, catalog) = harness(0, 0);
        catalog.create("/f", 0o644).await.unwrap();
        let now = Utc::now();
        let replica = Replica {
            id: 0,
            file_id: 0,
            storage_kind: StorageKind::Durable,
            status: ReplicaStatus::Available,
            server: "srv1".into(),
            pfn: "/data/f".into(),
            pool_name: "pool1".into(),
            filesystem: None,
            access_count: 0,
            create_time: now,
            access_time: now,
            pin_time: None,
            life_time: None,
            extra: ValueMap::new(),
        };
        let added = catalog.add_replica("/f", replica).await.unwrap();
        let replicas = catalog.get_replicas("/f").await.unwrap();
        assert_eq!(replicas.len(), 1);
        assert_eq!(replicas[0].id, added.id);
    }
}
