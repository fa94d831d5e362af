//! The two cache tiers behind `application::cache_overlay::CachingCatalog`
//! (§4.6): a bounded in-process LRU and a shared key-value store.

pub mod local;
pub mod shared;
