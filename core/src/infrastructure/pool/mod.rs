//! `PoolDriver` backends (§4.5).

pub mod filesystem;
pub mod http;
pub mod object_store;
