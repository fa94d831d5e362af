//! Infrastructure layer: concrete backends for the ports `application`
//! defines. No domain logic lives here — only I/O and the adapters that
//! turn it into the traits `application` consumes.

pub mod cache;
pub mod config;
pub mod inode;
pub mod mapfile;
pub mod plugin_loader;
pub mod pool;
