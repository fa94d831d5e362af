//! Replica entity: one physical copy of a file in a pool.

use crate::domain::inode::InodeId;
use crate::domain::value::ValueMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ReplicaId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    Volatile,
    Durable,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaStatus {
    Available,
    BeingPopulated,
    BeingDeleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    pub id: ReplicaId,
    pub file_id: InodeId,
    pub storage_kind: StorageKind,
    pub status: ReplicaStatus,
    pub server: String,
    pub pfn: String,
    pub pool_name: String,
    pub filesystem: Option<String>,
    pub access_count: u64,
    pub create_time: DateTime<Utc>,
    pub access_time: DateTime<Utc>,
    /// §SUPPLEMENTED 3: pin/life times, present in the entity but otherwise
    /// unused until `pin_replica`/`unpin_replica` manipulate them.
    pub pin_time: Option<DateTime<Utc>>,
    pub life_time: Option<DateTime<Utc>>,
    pub extra: ValueMap,
}

impl Replica {
    /// §SUPPLEMENTED 3: a pinned replica (pin_time in the future) cannot be
    /// deleted.
    pub fn is_pinned(&self, now: DateTime<Utc>) -> bool {
        self.pin_time.map(|t| t > now).unwrap_or(false)
    }

    pub fn is_deletable(&self, now: DateTime<Utc>) -> bool {
        self.status != ReplicaStatus::BeingDeleted && !self.is_pinned(now)
    }
}
