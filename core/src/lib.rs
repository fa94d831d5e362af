//! # meridian-core
//!
//! Namespace-and-storage middleware for grid/HPC data management: a
//! POSIX-like hierarchical namespace (files, directories, symlinks, ACLs,
//! extended attributes, checksums) whose logical file names resolve to one
//! or more physical replicas across heterogeneous storage backends.
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← admin/introspection HTTP surface (axum)
//!     ↓
//! application/    ← plugin/stack composition, Catalog, PoolManager, cache overlay
//!     ↓
//! domain/         ← aggregates, value objects, the pure data model
//!     ↓
//! infrastructure/ ← Postgres/in-memory INode stores, pool drivers, cache
//!                   tiers, mapfile/plugin/config loaders
//! ```
//!
//! ## Subsystems
//!
//! | Subsystem | Key modules |
//! |---|---|
//! | Plugin/stack composition | [`application::plugin_manager`], [`application::stack`] |
//! | Namespace catalog & INode layer | [`application::inode_store`], [`application::catalog`] |
//! | Security model | [`domain::security`], [`domain::token`], [`domain::mapfile`] |
//! | Pool/replica/I/O pipeline | [`application::pool`], [`application::io`] |
//! | Distributed cache coherence | [`application::cache_overlay`] |
//!
//! ## Integration Tests
//!
//! See `core/tests/` for cross-module integration tests (stack composition,
//! catalog permission precedence, cache overlay consistency).

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
