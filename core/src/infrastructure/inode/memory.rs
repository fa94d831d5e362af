//! In-memory `InodeStore`, for tests and single-process deployments.
//!
//! Grounded on the teacher's `InMemory*Repository` siblings referenced from
//! `application/repository_factory.rs` — a `Mutex`-guarded `HashMap` keyed
//! by id, with a second index for name lookup.

use crate::application::inode_store::{InodeStore, InodeTransaction};
use crate::domain::acl::Acl;
use crate::domain::dirent::{DirEntry, DirEntryX};
use crate::domain::errors::CatalogError;
use crate::domain::identity::{Gid, Uid};
use crate::domain::inode::{Checksum, FileStatus, FileType, INode, InodeId};
use crate::domain::replica::{Replica, ReplicaId};
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

struct State {
    inodes: HashMap<InodeId, INode>,
    symlinks: HashMap<InodeId, String>,
    replicas: HashMap<ReplicaId, Replica>,
    next_inode: InodeId,
    next_replica: ReplicaId,
}

impl State {
    fn children_of(&self, parent: InodeId) -> Vec<&INode> {
        let mut v: Vec<&INode> = self.inodes.values().filter(|n| n.parent_id == Some(parent)).collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }
}

/// A `tokio::fs`-free, no-I/O in-process store. Root inode is seeded at
/// `ROOT_INODE_ID` (id 1) on construction.
pub struct MemoryInodeStore {
    state: Mutex<State>,
}

impl Default for MemoryInodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInodeStore {
    pub fn new() -> Self {
        let now = Utc::now();
        let root = INode {
            id: crate::application::stack::ROOT_INODE_ID,
            parent_id: None,
            name: "/".to_owned(),
            file_type: FileType::Directory,
            mode: 0o755,
            uid: 0,
            gid: 0,
            size: 0,
            nlink: 2,
            status: FileStatus::Online,
            ctime: now,
            mtime: now,
            atime: now,
            guid: Uuid::nil(),
            checksum: None,
            acl: Acl::default(),
            comment: None,
            xattrs: ValueMap::new(),
        };
        let mut inodes = HashMap::new();
        inodes.insert(root.id, root);
        MemoryInodeStore {
            state: Mutex::new(State {
                inodes,
                symlinks: HashMap::new(),
                replicas: HashMap::new(),
                next_inode: crate::application::stack::ROOT_INODE_ID + 1,
                next_replica: 1,
            }),
        }
    }
}

/// A no-op transaction: the in-memory store has no rollback log, so
/// `rollback` is only correct for single-statement operations (matching
/// every call site in `BuiltinCatalog`, which never issues more than one
/// mutating `InodeStore` call between `begin`/`commit`).
struct MemoryTransaction;

#[async_trait]
impl InodeTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), CatalogError> {
        Ok(())
    }
    async fn rollback(self: Box<Self>) -> Result<(), CatalogError> {
        Ok(())
    }
}

#[async_trait]
impl InodeStore for MemoryInodeStore {
    async fn begin(&self) -> Result<Box<dyn InodeTransaction>, CatalogError> {
        Ok(Box::new(MemoryTransaction))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        parent: InodeId,
        name: &str,
        uid: Uid,
        gid: Gid,
        mode: u16,
        size: u64,
        file_type: FileType,
        status: FileStatus,
        checksum: Option<Checksum>,
        acl: Acl,
    ) -> Result<INode, CatalogError> {
        let mut state = self.state.lock();
        if !state.inodes.contains_key(&parent) {
            return Err(CatalogError::NoSuchFile(format!("parent inode {parent}")));
        }
        if state.inodes.values().any(|n| n.parent_id == Some(parent) && n.name == name) {
            return Err(CatalogError::FileExists(name.to_owned()));
        }
        let id = state.next_inode;
        state.next_inode += 1;
        let now = Utc::now();
        let node = INode {
            id,
            parent_id: Some(parent),
            name: name.to_owned(),
            file_type,
            mode,
            uid,
            gid,
            size,
            nlink: 1,
            status,
            ctime: now,
            mtime: now,
            atime: now,
            guid: Uuid::new_v4(),
            checksum,
            acl,
            comment: None,
            xattrs: ValueMap::new(),
        };
        state.inodes.insert(id, node.clone());
        Ok(node)
    }

    async fn symlink(&self, inode: InodeId, target: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        if !state.inodes.contains_key(&inode) {
            return Err(CatalogError::NoSuchFile(format!("inode {inode}")));
        }
        state.symlinks.insert(inode, target.to_owned());
        Ok(())
    }

    async fn unlink(&self, inode: InodeId) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        state.inodes.remove(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        state.symlinks.remove(&inode);
        Ok(())
    }

    async fn move_inode(&self, inode: InodeId, new_parent: InodeId) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        if !state.inodes.contains_key(&new_parent) {
            return Err(CatalogError::NoSuchFile(format!("parent inode {new_parent}")));
        }
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.parent_id = Some(new_parent);
        Ok(())
    }

    async fn rename_inode(&self, inode: InodeId, new_name: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.name = new_name.to_owned();
        Ok(())
    }

    async fn stat(&self, inode: InodeId) -> Result<INode, CatalogError> {
        self.state.lock().inodes.get(&inode).cloned().ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))
    }

    async fn stat_by_name(&self, parent: InodeId, name: &str) -> Result<INode, CatalogError> {
        self.state
            .lock()
            .inodes
            .values()
            .find(|n| n.parent_id == Some(parent) && n.name == name)
            .cloned()
            .ok_or_else(|| CatalogError::NoSuchFile(name.to_owned()))
    }

    async fn stat_by_guid(&self, guid: Uuid) -> Result<INode, CatalogError> {
        self.state
            .lock()
            .inodes
            .values()
            .find(|n| n.guid == guid)
            .cloned()
            .ok_or_else(|| CatalogError::NoSuchFile(format!("guid {guid}")))
    }

    async fn read_link(&self, inode: InodeId) -> Result<String, CatalogError> {
        self.state.lock().symlinks.get(&inode).cloned().ok_or_else(|| CatalogError::InvalidArgument(format!("inode {inode} is not a symlink")))
    }

    async fn add_replica(&self, mut replica: Replica) -> Result<Replica, CatalogError> {
        let mut state = self.state.lock();
        let id = state.next_replica;
        state.next_replica += 1;
        replica.id = id;
        state.replicas.insert(id, replica.clone());
        Ok(replica)
    }

    async fn update_replica(&self, replica: Replica) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        if !state.replicas.contains_key(&replica.id) {
            return Err(CatalogError::NoSuchFile(format!("replica {}", replica.id)));
        }
        state.replicas.insert(replica.id, replica);
        Ok(())
    }

    async fn delete_replica(&self, id: ReplicaId) -> Result<(), CatalogError> {
        self.state.lock().replicas.remove(&id).map(|_| ()).ok_or_else(|| CatalogError::NoSuchFile(format!("replica {id}")))
    }

    async fn get_replicas(&self, file_id: InodeId) -> Result<Vec<Replica>, CatalogError> {
        Ok(self.state.lock().replicas.values().filter(|r| r.file_id == file_id).cloned().collect())
    }

    async fn utime(&self, inode: InodeId, atime: DateTime<Utc>, mtime: DateTime<Utc>) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.atime = atime;
        node.mtime = mtime;
        Ok(())
    }

    async fn set_mode(&self, inode: InodeId, mode: u16) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.mode = mode;
        Ok(())
    }

    async fn set_owner(&self, inode: InodeId, uid: Uid, gid: Gid) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.uid = uid;
        node.gid = gid;
        Ok(())
    }

    async fn set_size(&self, inode: InodeId, size: u64) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.size = size;
        Ok(())
    }

    async fn set_checksum(&self, inode: InodeId, checksum: Checksum) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.checksum = Some(checksum);
        Ok(())
    }

    async fn set_acl(&self, inode: InodeId, acl: Acl) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.acl = acl;
        Ok(())
    }

    async fn set_guid(&self, inode: InodeId, guid: Uuid) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.guid = guid;
        Ok(())
    }

    async fn set_comment(&self, inode: InodeId, comment: Option<String>) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.comment = comment;
        Ok(())
    }

    async fn get_comment(&self, inode: InodeId) -> Result<Option<String>, CatalogError> {
        self.state.lock().inodes.get(&inode).map(|n| n.comment.clone()).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))
    }

    async fn update_xattrs(&self, inode: InodeId, attrs: ValueMap) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state.inodes.get_mut(&inode).ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        node.xattrs.extend(attrs);
        Ok(())
    }

    async fn open_dir(&self, inode: InodeId) -> Result<Vec<DirEntryX>, CatalogError> {
        let state = self.state.lock();
        if !state.inodes.contains_key(&inode) {
            return Err(CatalogError::NoSuchFile(format!("inode {inode}")));
        }
        Ok(state
            .children_of(inode)
            .into_iter()
            .map(|n| DirEntryX { entry: DirEntry { name: n.name.clone(), inode_id: n.id }, stat: n.clone() })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_stat_and_list() {
        let store = MemoryInodeStore::new();
        let root = crate::application::stack::ROOT_INODE_ID;
        let node = store
            .create(root, "a.txt", 0, 0, 0o644, 0, FileType::Regular, FileStatus::Online, None, Acl::default())
            .await
            .unwrap();
        let fetched = store.stat(node.id).await.unwrap();
        assert_eq!(fetched.name, "a.txt");
        let entries = store.open_dir(root).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_fails() {
        let store = MemoryInodeStore::new();
        let root = crate::application::stack::ROOT_INODE_ID;
        store.create(root, "a.txt", 0, 0, 0o644, 0, FileType::Regular, FileStatus::Online, None, Acl::default()).await.unwrap();
        let err = store.create(root, "a.txt", 0, 0, 0o644, 0, FileType::Regular, FileStatus::Online, None, Acl::default()).await;
        assert!(matches!(err, Err(CatalogError::FileExists(_))));
    }

    #[tokio::test]
    async fn replica_lifecycle() {
        let store = MemoryInodeStore::new();
        let root = crate::application::stack::ROOT_INODE_ID;
        let node = store.create(root, "f", 0, 0, 0o644, 0, FileType::Regular, FileStatus::Online, None, Acl::default()).await.unwrap();
        let now = Utc::now();
        let replica = Replica {
            id: 0,
            file_id: node.id,
            storage_kind: crate::domain::replica::StorageKind::Durable,
            status: crate::domain::replica::ReplicaStatus::Available,
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
        let stored = store.add_replica(replica).await.unwrap();
        assert_eq!(store.get_replicas(node.id).await.unwrap().len(), 1);
        store.delete_replica(stored.id).await.unwrap();
        assert!(store.get_replicas(node.id).await.unwrap().is_empty());
    }
}
