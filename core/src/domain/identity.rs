//! User/group identity records.

use crate::domain::value::ValueMap;
use serde::{Deserialize, Serialize};

pub type Uid = u32;
pub type Gid = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: Uid,
    pub name: String,
    pub banned: bool,
    pub extra: ValueMap,
}

impl UserInfo {
    pub fn new(uid: Uid, name: impl Into<String>) -> Self {
        UserInfo { uid, name: name.into(), banned: false, extra: ValueMap::new() }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub gid: Gid,
    pub name: String,
    pub banned: bool,
    pub extra: ValueMap,
}

impl GroupInfo {
    pub fn new(gid: Gid, name: impl Into<String>) -> Self {
        GroupInfo { gid, name: name.into(), banned: false, extra: ValueMap::new() }
    }
}
