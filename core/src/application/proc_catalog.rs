//! `/proc`-like introspection (§4.8): a read-only virtual tree exposing the
//! live stack composition and current identity.
//!
//! New: spec §4.8 names no direct teacher analog. Built as a `Catalog`
//! implementation per the spec's own framing ("a built-in Catalog provides
//! a read-only virtual tree"), using synthetic negative inode ids so it
//! never collides with a real backend's id space.

use crate::application::catalog::Catalog;
use crate::application::stack::StackHandle;
use crate::domain::acl::Acl;
use crate::domain::dirent::{DirEntry, DirEntryX, DirHandle};
use crate::domain::errors::CatalogError;
use crate::domain::identity::{Gid, Uid};
use crate::domain::inode::{Checksum, FileStatus, FileType, INode};
use crate::domain::replica::{Replica, ReplicaId};
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

pub const PROC_ROOT_INODE: i64 = -1;
pub const PROC_STACK_INODE: i64 = -2;
pub const PROC_WHOAMI_INODE: i64 = -3;

pub struct ProcCatalog {
    stack: StackHandle,
}

impl ProcCatalog {
    pub fn new(stack: StackHandle) -> Self {
        ProcCatalog { stack }
    }

    fn synthetic(&self, id: i64, name: &str, file_type: FileType, size: u64) -> INode {
        let now = Utc::now();
        INode {
            id,
            parent_id: if id == PROC_ROOT_INODE { None } else { Some(PROC_ROOT_INODE) },
            name: name.to_owned(),
            file_type,
            mode: 0o555,
            uid: 0,
            gid: 0,
            size,
            nlink: 1,
            status: FileStatus::Online,
            ctime: now,
            mtime: now,
            atime: now,
            guid: Uuid::nil(),
            checksum: None,
            acl: Acl::default(),
            comment: None,
            xattrs: Default::default(),
        }
    }

    /// Renders the serialized content of a `/proc` file, for the IODriver
    /// (or, here, the admin HTTP surface) to return as a bounded byte
    /// stream.
    pub fn render(&self, path: &str) -> Result<Vec<u8>, CatalogError> {
        match path {
            "/proc/stack" => {
                let ids = self
                    .stack
                    .catalog()
                    .map(|c| vec![c.impl_id()])
                    .unwrap_or_default();
                serde_json::to_vec_pretty(&ids).map_err(|e| CatalogError::InvalidArgument(e.to_string()))
            }
            "/proc/whoami" => {
                let ctx = self.stack.security_context().map_err(|e| CatalogError::Permission(e.to_string()))?;
                serde_json::to_vec_pretty(&ctx).map_err(|e| CatalogError::InvalidArgument(e.to_string()))
            }
            other => Err(CatalogError::NoSuchFile(other.to_owned())),
        }
    }
}

fn read_only() -> CatalogError {
    CatalogError::Permission("/proc is a read-only virtual tree".into())
}

#[async_trait]
impl Catalog for ProcCatalog {
    fn impl_id(&self) -> String {
        "Proc".to_owned()
    }

    async fn extended_stat(&self, path: &str, _follow_sym: bool) -> Result<INode, CatalogError> {
        match path {
            "/proc" => Ok(self.synthetic(PROC_ROOT_INODE, "proc", FileType::Directory, 0)),
            "/proc/stack" => Ok(self.synthetic(PROC_STACK_INODE, "stack", FileType::Regular, self.render(path)?.len() as u64)),
            "/proc/whoami" => Ok(self.synthetic(PROC_WHOAMI_INODE, "whoami", FileType::Regular, self.render(path)?.len() as u64)),
            other => Err(CatalogError::NoSuchFile(other.to_owned())),
        }
    }

    async fn read_link(&self, _path: &str) -> Result<String, CatalogError> {
        Err(CatalogError::InvalidArgument("/proc entries are never symlinks".into()))
    }

    async fn create(&self, _path: &str, _mode: u16) -> Result<INode, CatalogError> {
        Err(read_only())
    }
    async fn make_dir(&self, _path: &str, _mode: u16) -> Result<INode, CatalogError> {
        Err(read_only())
    }
    async fn symlink(&self, _path: &str, _target: &str) -> Result<INode, CatalogError> {
        Err(read_only())
    }
    async fn unlink(&self, _path: &str) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn remove_dir(&self, _path: &str) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn rename(&self, _from: &str, _to: &str) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn set_mode(&self, _path: &str, _mode: u16) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn set_owner(&self, _path: &str, _uid: Option<Uid>, _gid: Option<Gid>) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn set_size(&self, _path: &str, _size: u64) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn set_checksum(&self, _path: &str, _checksum: Checksum) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn set_acl(&self, _path: &str, _acl: Acl) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn set_guid(&self, _path: &str, _guid: Uuid) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn utime(&self, _path: &str) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn update_extended_attributes(&self, _path: &str, _attrs: ValueMap) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn get_comment(&self, _path: &str) -> Result<Option<String>, CatalogError> {
        Ok(None)
    }
    async fn set_comment(&self, _path: &str, _comment: Option<String>) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn add_replica(&self, _path: &str, _replica: Replica) -> Result<Replica, CatalogError> {
        Err(read_only())
    }
    async fn update_replica(&self, _replica: Replica) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn delete_replica(&self, _path: &str, _replica_id: ReplicaId) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn get_replicas(&self, _path: &str) -> Result<Vec<Replica>, CatalogError> {
        Ok(vec![])
    }
    async fn pin_replica(&self, _path: &str, _replica_id: ReplicaId, _pin_seconds: i64) -> Result<(), CatalogError> {
        Err(read_only())
    }
    async fn unpin_replica(&self, _path: &str, _replica_id: ReplicaId) -> Result<(), CatalogError> {
        Err(read_only())
    }

    async fn open_dir(&self, path: &str) -> Result<DirHandle, CatalogError> {
        if path != "/proc" {
            return Err(CatalogError::NotDirectory(path.to_owned()));
        }
        let entries = vec![
            DirEntryX {
                entry: DirEntry { name: "stack".into(), inode_id: PROC_STACK_INODE },
                stat: self.synthetic(PROC_STACK_INODE, "stack", FileType::Regular, 0),
            },
            DirEntryX {
                entry: DirEntry { name: "whoami".into(), inode_id: PROC_WHOAMI_INODE },
                stat: self.synthetic(PROC_WHOAMI_INODE, "whoami", FileType::Regular, 0),
            },
        ];
        Ok(DirHandle::new(PROC_ROOT_INODE, entries))
    }

    async fn close_dir(&self, handle: &mut DirHandle) -> Result<(), CatalogError> {
        handle.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::builtin_factories::BuiltinCatalogFactory;
    use crate::application::plugin_manager::PluginManager;
    use crate::application::stack::StackInstance;
    use crate::domain::identity::{GroupInfo, UserInfo};
    use crate::domain::security::{SecurityContext, SecurityCredentials};
    use crate::infrastructure::inode::memory::MemoryInodeStore;
    use std::sync::Arc;

    fn stack_with_builtin_catalog() -> StackInstance {
        let manager = PluginManager::new();
        manager.register_catalog_factory(Arc::new(BuiltinCatalogFactory::new(Arc::new(MemoryInodeStore::new()))));
        let stack = StackInstance::new(Arc::new(manager));
        stack.set_security_context(SecurityContext {
            user: UserInfo::new(0, "root"),
            primary_group: GroupInfo::new(0, "root"),
            groups: vec![],
            credentials: SecurityCredentials {
                mechanism: "test".into(),
                client_name: "/CN=root".into(),
                remote_address: "local".into(),
                fqans: vec![],
                session_id: None,
            },
        });
        stack.catalog().unwrap();
        stack
    }

    #[tokio::test]
    async fn render_stack_reports_the_live_catalog_chain() {
        let stack = stack_with_builtin_catalog();
        let proc = ProcCatalog::new(stack.handle());
        let bytes = proc.render("/proc/stack").unwrap();
        let ids: Vec<String> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ids, vec!["Builtin".to_owned()]);
    }

    #[tokio::test]
    async fn render_whoami_reports_the_installed_identity() {
        let stack = stack_with_builtin_catalog();
        let proc = ProcCatalog::new(stack.handle());
        let bytes = proc.render("/proc/whoami").unwrap();
        let ctx: SecurityContext = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ctx.user.uid, 0);
    }

    #[tokio::test]
    async fn render_rejects_unknown_paths() {
        let stack = stack_with_builtin_catalog();
        let proc = ProcCatalog::new(stack.handle());
        assert!(proc.render("/proc/nonexistent").is_err());
    }

    #[tokio::test]
    async fn open_dir_lists_stack_and_whoami() {
        let stack = stack_with_builtin_catalog();
        let proc = ProcCatalog::new(stack.handle());
        let mut handle = proc.open_dir("/proc").await.unwrap();
        let mut names = vec![];
        while let Some(entry) = handle.read_dir().unwrap() {
            names.push(entry.name);
        }
        names.sort();
        assert_eq!(names, vec!["stack".to_owned(), "whoami".to_owned()]);
        proc.close_dir(&mut handle).await.unwrap();
    }

    #[tokio::test]
    async fn proc_is_read_only() {
        let stack = stack_with_builtin_catalog();
        let proc = ProcCatalog::new(stack.handle());
        assert!(proc.create("/proc/new", 0o644).await.is_err());
        assert!(proc.unlink("/proc/stack").await.is_err());
        assert!(proc.set_mode("/proc/stack", 0o600).await.is_err());
    }

    #[tokio::test]
    async fn extended_stat_synthesises_entries_with_negative_inode_ids() {
        let stack = stack_with_builtin_catalog();
        let proc = ProcCatalog::new(stack.handle());
        let root = proc.extended_stat("/proc", false).await.unwrap();
        assert_eq!(root.id, PROC_ROOT_INODE);
        let stack_file = proc.extended_stat("/proc/stack", false).await.unwrap();
        assert_eq!(stack_file.id, PROC_STACK_INODE);
        assert!(stack_file.size > 0);
    }
}
