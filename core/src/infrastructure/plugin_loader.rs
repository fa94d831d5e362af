//! Dynamic-library plugin loading (§4.1).
//!
//! Grounded on `other_examples/manifests/c04ch1337-pagi-xcurzens` and
//! `other_examples/manifests/GhrammR-the-janitor`, both of which load
//! shared libraries at runtime via `libloading` and call back into a
//! registry through an exported entry point. The `LoadPlugin <symbol>
//! <path>` config directive names both the library path and the exported
//! registration symbol, so one library can expose several independently
//! loadable entry points (e.g. `meridian_register_inode_mysql` and
//! `meridian_register_catalog_cache` from the same `.so`).

use crate::application::plugin_manager::{PluginAbiVersion, PluginManager, API_VERSION};
use crate::domain::errors::PluginError;
use libloading::{Library, Symbol};
use std::path::Path;

type RegisterFn = unsafe extern "C" fn(&PluginManager) -> PluginAbiVersion;

/// Owns the `Library` handles so they outlive anything the plugin
/// registered (a factory closure capturing code from the `.so` would
/// otherwise dangle once the library is unloaded).
#[derive(Default)]
pub struct PluginLoader {
    libraries: Vec<Library>,
}

impl PluginLoader {
    pub fn new() -> Self {
        PluginLoader { libraries: Vec::new() }
    }

    /// Loads `path`, resolves `symbol`, calls it with `manager`, and checks
    /// the returned ABI version. On mismatch the library is still kept
    /// loaded (registrations it made, if any, are left in place for the
    /// caller to reason about) but the error is surfaced.
    ///
    /// # Safety
    /// Calls into arbitrary native code. Callers must only load libraries
    /// from a trusted configuration source, never from user input.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        symbol: &str,
        manager: &PluginManager,
    ) -> Result<(), PluginError> {
        let path = path.as_ref();
        let lib = unsafe { Library::new(path) }.map_err(|source| PluginError::LoadFailure {
            path: path.display().to_string(),
            source,
        })?;

        let got = unsafe {
            let register: Symbol<RegisterFn> =
                lib.get(symbol.as_bytes()).map_err(|_| PluginError::MissingSymbol(symbol.to_owned()))?;
            register(manager)
        };

        self.libraries.push(lib);

        if got != API_VERSION {
            return Err(PluginError::ApiVersionMismatch { expected: API_VERSION, got });
        }
        Ok(())
    }

    pub fn loaded_count(&self) -> usize {
        self.libraries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_surfaces_load_failure() {
        let manager = PluginManager::new();
        let mut loader = PluginLoader::new();
        let err = loader.load("/nonexistent/plugin.so", "meridian_plugin_register", &manager).unwrap_err();
        assert!(matches!(err, PluginError::LoadFailure { .. }));
    }

    #[test]
    fn new_loader_has_no_libraries() {
        let loader = PluginLoader::new();
        assert_eq!(loader.loaded_count(), 0);
    }
}
