//! Catalog/pool audit events, reusing the teacher's `StorageEvent`-style
//! flat enum shape (one variant per observable mutation, each carrying the
//! fields a listener needs, no nested payload types).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    Created { path: String, uid: u32, gid: u32, at: DateTime<Utc> },
    Unlinked { path: String, at: DateTime<Utc> },
    DirectoryCreated { path: String, at: DateTime<Utc> },
    DirectoryRemoved { path: String, at: DateTime<Utc> },
    Renamed { from: String, to: String, at: DateTime<Utc> },
    ModeChanged { path: String, mode: u16, at: DateTime<Utc> },
    OwnerChanged { path: String, uid: u32, gid: u32, at: DateTime<Utc> },
    AclChanged { path: String, at: DateTime<Utc> },
    CommentChanged { path: String, at: DateTime<Utc> },
    AccessDenied { path: String, uid: u32, requested: u8, at: DateTime<Utc> },
    ReplicaAdded { path: String, pfn: String, at: DateTime<Utc> },
    ReplicaDeleted { path: String, pfn: String, at: DateTime<Utc> },
    ReplicaPinned { path: String, pfn: String, at: DateTime<Utc> },
    ReplicaUnpinned { path: String, pfn: String, at: DateTime<Utc> },
}
