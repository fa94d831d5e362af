//! Directory iteration records (§4.7).
//!
//! `DirEntry` is the minimal `dirent`-like record `readDir` yields;
//! `DirEntryX` is the extended record `readDirx` yields. Per §9's design
//! note and spec §4.7's explicit sanction of either choice, this is
//! value-returning iteration rather than pointer-aliasing into the
//! handle's own storage — the pointer-aliasing behaviour is actively
//! hostile to express in safe Rust, and the spec permits the alternative.

use crate::domain::inode::{INode, InodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub inode_id: InodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntryX {
    pub entry: DirEntry,
    pub stat: INode,
}

/// A one-shot handle: `close` exactly once (§4.7). Further calls after
/// closing return an error rather than invoking undefined behaviour.
#[derive(Debug)]
pub struct DirHandle {
    pub(crate) inode_id: InodeId,
    pub(crate) entries: std::vec::IntoIter<DirEntryX>,
    pub(crate) closed: bool,
}

impl DirHandle {
    pub fn new(inode_id: InodeId, entries: Vec<DirEntryX>) -> Self {
        DirHandle { inode_id, entries: entries.into_iter(), closed: false }
    }

    pub fn inode_id(&self) -> InodeId {
        self.inode_id
    }

    pub fn read_dir(&mut self) -> Result<Option<DirEntry>, crate::domain::errors::CatalogError> {
        if self.closed {
            return Err(crate::domain::errors::CatalogError::InvalidArgument(
                "readDir on a closed directory handle".into(),
            ));
        }
        Ok(self.entries.next().map(|x| x.entry))
    }

    pub fn read_dirx(&mut self) -> Result<Option<DirEntryX>, crate::domain::errors::CatalogError> {
        if self.closed {
            return Err(crate::domain::errors::CatalogError::InvalidArgument(
                "readDirx on a closed directory handle".into(),
            ));
        }
        Ok(self.entries.next())
    }

    pub fn close(&mut self) -> Result<(), crate::domain::errors::CatalogError> {
        if self.closed {
            return Err(crate::domain::errors::CatalogError::InvalidArgument(
                "closeDir called twice on the same handle".into(),
            ));
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::acl::Acl;
    use crate::domain::inode::{FileStatus, FileType};
    use chrono::Utc;
    use uuid::Uuid;

    fn dummy_inode(id: InodeId, name: &str) -> INode {
        INode {
            id,
            parent_id: Some(1),
            name: name.into(),
            file_type: FileType::Regular,
            mode: 0o644,
            uid: 0,
            gid: 0,
            size: 0,
            nlink: 1,
            status: FileStatus::Online,
            ctime: Utc::now(),
            mtime: Utc::now(),
            atime: Utc::now(),
            guid: Uuid::nil(),
            checksum: None,
            acl: Acl::default(),
            comment: None,
            xattrs: Default::default(),
        }
    }

    #[test]
    fn one_shot_read_then_close() {
        let entries = vec![DirEntryX { entry: DirEntry { name: "a".into(), inode_id: 2 }, stat: dummy_inode(2, "a") }];
        let mut h = DirHandle::new(1, entries);
        assert_eq!(h.read_dir().unwrap().unwrap().name, "a");
        assert!(h.read_dir().unwrap().is_none());
        h.close().unwrap();
        assert!(h.read_dir().is_err());
        assert!(h.close().is_err());
    }
}
