//! Pool entity: a named storage backing store.

use crate::domain::value::ValueMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PoolType(pub String);

impl PoolType {
    pub fn filesystem() -> Self {
        PoolType("filesystem".into())
    }
    pub fn s3() -> Self {
        PoolType("s3".into())
    }
    pub fn hadoop() -> Self {
        PoolType("hadoop".into())
    }
    pub fn http() -> Self {
        PoolType("http".into())
    }
}

/// §SUPPLEMENTED 2: administrative status from `dm_pool.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    Active,
    ReadOnly,
    Disabled,
}

/// `getPools(availability)`'s filter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Any,
    Read,
    Write,
    Both,
    None,
}

impl Availability {
    pub fn matches(self, status: PoolStatus) -> bool {
        match self {
            Availability::None => false,
            Availability::Any => true,
            Availability::Read => matches!(status, PoolStatus::Active | PoolStatus::ReadOnly),
            Availability::Write => matches!(status, PoolStatus::Active),
            Availability::Both => matches!(status, PoolStatus::Active),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    pub pool_type: PoolType,
    pub status: PoolStatus,
    pub extra: ValueMap,
}

impl Pool {
    pub fn new(name: impl Into<String>, pool_type: PoolType) -> Self {
        Pool { name: name.into(), pool_type, status: PoolStatus::Active, extra: ValueMap::new() }
    }
}
