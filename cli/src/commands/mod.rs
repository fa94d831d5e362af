pub mod acl;
pub mod config;
pub mod mapfile;
pub mod plugin;
pub mod proc;
pub mod token;

pub use acl::AclCommand;
pub use config::ConfigCommand;
pub use mapfile::MapfileCommand;
pub use plugin::PluginCommand;
pub use proc::ProcCommand;
pub use token::TokenCommand;
