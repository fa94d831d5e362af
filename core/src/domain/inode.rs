//! INode entity: the persistent metadata record underlying files,
//! directories and symlinks.

use crate::domain::acl::Acl;
use crate::domain::identity::{Gid, Uid};
use crate::domain::value::ValueMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type InodeId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
}

/// File status, matching §3's "online, migrated, being-populated" triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Online,
    Migrated,
    BeingPopulated,
}

/// `ChecksumType` is an open string-backed newtype: dmlite allows
/// administrator-defined checksum algorithms alongside the well-known ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChecksumType(pub String);

impl ChecksumType {
    pub fn adler32() -> Self {
        ChecksumType("adler32".into())
    }
    pub fn md5() -> Self {
        ChecksumType("md5".into())
    }
    pub fn crc32() -> Self {
        ChecksumType("crc32".into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checksum {
    pub kind: ChecksumType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct INode {
    pub id: InodeId,
    pub parent_id: Option<InodeId>,
    pub name: String,
    pub file_type: FileType,
    pub mode: u16,
    pub uid: Uid,
    pub gid: Gid,
    pub size: u64,
    pub nlink: u32,
    pub status: FileStatus,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub atime: DateTime<Utc>,
    pub guid: Uuid,
    pub checksum: Option<Checksum>,
    pub acl: Acl,
    pub comment: Option<String>,
    pub xattrs: ValueMap,
}

impl INode {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }

    /// §4.3's `ExtendedStat` view, plus whatever else the caller needs from
    /// the record. Kept as an alias rather than a separate struct: the
    /// INode *is* the extended-stat record at this layer, permission
    /// checking lives above it in the Catalog.
    pub fn stat(&self) -> &INode {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symlink {
    pub inode_id: InodeId,
    pub target: String,
}
