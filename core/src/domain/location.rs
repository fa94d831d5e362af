//! `Location`/`Chunk`: the storage layer's answer to "where do I read/write".

use crate::domain::value::ValueMap;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub url: Url,
    pub offset: u64,
    pub size: u64,
    pub extra: ValueMap,
}

/// An ordered list of Chunks. Multi-chunk locations represent striping;
/// most backends return a single chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location(pub Vec<Chunk>);

impl Location {
    pub fn single(chunk: Chunk) -> Self {
        Location(vec![chunk])
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.0
    }
}

/// Bit flags for I/O operations (§4.5). `INSECURE` bypasses token
/// verification for disk-to-disk tunnelling (§SUPPLEMENTED 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoFlags(pub u32);

impl IoFlags {
    pub const READ: IoFlags = IoFlags(0b001);
    pub const WRITE: IoFlags = IoFlags(0b010);
    pub const INSECURE: IoFlags = IoFlags(0b100);

    pub fn contains(self, other: IoFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_write(self) -> bool {
        self.contains(IoFlags::WRITE)
    }
}

impl std::ops::BitOr for IoFlags {
    type Output = IoFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        IoFlags(self.0 | rhs.0)
    }
}
