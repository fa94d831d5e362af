//! `InodeStore`: inode-indexed primitives, no permission checking (§4.2).
//!
//! Grounded on `domain/repository.rs`'s `VolumeRepository`-style async
//! trait shape (one method per CRUD concern, `Result<T, LeafError>`
//! returns, `Send + Sync` so a single store can back every StackInstance).

use crate::domain::acl::Acl;
use crate::domain::dirent::DirEntryX;
use crate::domain::errors::CatalogError;
use crate::domain::identity::{Gid, Uid};
use crate::domain::inode::{Checksum, FileStatus, FileType, INode, InodeId};
use crate::domain::replica::{Replica, ReplicaId};
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Explicit `begin`/`commit`/`rollback` bracketing for multi-row mutations
/// (§4.2: rename across directories, unlink that also removes comments and
/// replicas). On rollback no visible state has changed.
#[async_trait]
pub trait InodeTransaction: Send {
    async fn commit(self: Box<Self>) -> Result<(), CatalogError>;
    async fn rollback(self: Box<Self>) -> Result<(), CatalogError>;
}

#[allow(clippy::too_many_arguments)]
#[async_trait]
pub trait InodeStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn InodeTransaction>, CatalogError>;

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
    ) -> Result<INode, CatalogError>;

    async fn symlink(&self, inode: InodeId, target: &str) -> Result<(), CatalogError>;
    async fn unlink(&self, inode: InodeId) -> Result<(), CatalogError>;
    async fn move_inode(&self, inode: InodeId, new_parent: InodeId) -> Result<(), CatalogError>;
    async fn rename_inode(&self, inode: InodeId, new_name: &str) -> Result<(), CatalogError>;

    async fn stat(&self, inode: InodeId) -> Result<INode, CatalogError>;
    async fn stat_by_name(&self, parent: InodeId, name: &str) -> Result<INode, CatalogError>;
    async fn stat_by_guid(&self, guid: Uuid) -> Result<INode, CatalogError>;
    async fn read_link(&self, inode: InodeId) -> Result<String, CatalogError>;

    async fn add_replica(&self, replica: Replica) -> Result<Replica, CatalogError>;
    async fn update_replica(&self, replica: Replica) -> Result<(), CatalogError>;
    async fn delete_replica(&self, id: ReplicaId) -> Result<(), CatalogError>;
    async fn get_replicas(&self, file_id: InodeId) -> Result<Vec<Replica>, CatalogError>;

    async fn utime(&self, inode: InodeId, atime: DateTime<Utc>, mtime: DateTime<Utc>) -> Result<(), CatalogError>;
    async fn set_mode(&self, inode: InodeId, mode: u16) -> Result<(), CatalogError>;
    async fn set_owner(&self, inode: InodeId, uid: Uid, gid: Gid) -> Result<(), CatalogError>;
    async fn set_size(&self, inode: InodeId, size: u64) -> Result<(), CatalogError>;
    async fn set_checksum(&self, inode: InodeId, checksum: Checksum) -> Result<(), CatalogError>;
    async fn set_acl(&self, inode: InodeId, acl: Acl) -> Result<(), CatalogError>;
    async fn set_guid(&self, inode: InodeId, guid: Uuid) -> Result<(), CatalogError>;
    async fn set_comment(&self, inode: InodeId, comment: Option<String>) -> Result<(), CatalogError>;
    async fn get_comment(&self, inode: InodeId) -> Result<Option<String>, CatalogError>;
    async fn update_xattrs(&self, inode: InodeId, attrs: ValueMap) -> Result<(), CatalogError>;

    async fn open_dir(&self, inode: InodeId) -> Result<Vec<DirEntryX>, CatalogError>;
}
