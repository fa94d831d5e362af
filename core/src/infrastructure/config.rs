//! Line-oriented configuration file parsing (§6).
//!
//! Grammar: `# comment`, blank lines, `LoadPlugin <symbol> <path>`, or
//! `<key> <value>`. `LoadPlugin` loads a shared library and calls its
//! named registration symbol; every other pair is offered to every
//! registered factory via `PluginManager::configure`. A pair unrecognised
//! everywhere fails the whole load with the offending line number.
//!
//! Credential-shaped keys (`*_SECRET`, `*_PASSWORD`) prefer an environment
//! variable of the same name over the inline file value and are never
//! logged at their value, mirroring the teacher's environment-first
//! posture for secrets (`infrastructure/secrets_manager.rs`'s ADR-034
//! commentary) without pulling in a full vault client.

use crate::application::plugin_manager::PluginManager;
use crate::domain::errors::PluginError;
use crate::infrastructure::plugin_loader::PluginLoader;
use std::path::Path;

fn is_secret_key(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    upper.ends_with("_SECRET") || upper.ends_with("_PASSWORD")
}

/// Resolves a config value, preferring an environment variable of the same
/// name for secret-shaped keys (§ Configuration).
fn resolve_value(key: &str, file_value: &str) -> String {
    if is_secret_key(key) {
        if let Ok(from_env) = std::env::var(key) {
            return from_env;
        }
    }
    file_value.to_owned()
}

/// Parses and applies `path` against `manager`, loading any `LoadPlugin`
/// directives through `loader` along the way. Returns the number of
/// directives applied.
pub fn load_config(path: impl AsRef<Path>, manager: &PluginManager, loader: &mut PluginLoader) -> Result<usize, PluginError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| PluginError::MalformedConfig {
        path: path.display().to_string(),
        line: 0,
        reason: e.to_string(),
    })?;
    apply_config(&contents, &path.display().to_string(), manager, loader)
}

/// Applies already-read config `contents` (line numbers reported relative
/// to this buffer) against `manager`. Split out from [`load_config`] so
/// tests can exercise the grammar without touching the filesystem.
pub fn apply_config(
    contents: &str,
    source_name: &str,
    manager: &PluginManager,
    loader: &mut PluginLoader,
) -> Result<usize, PluginError> {
    let mut applied = 0;
    for (idx, raw_line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("LoadPlugin") {
            let mut parts = rest.split_whitespace();
            let (symbol, lib_path) = match (parts.next(), parts.next()) {
                (Some(symbol), Some(lib_path)) => (symbol, lib_path),
                _ => {
                    return Err(PluginError::MalformedConfig {
                        path: source_name.to_owned(),
                        line: line_no,
                        reason: "LoadPlugin requires <symbol> <path>".into(),
                    })
                }
            };
            loader.load(lib_path, symbol, manager)?;
            applied += 1;
            continue;
        }

        let (key, value) = line.split_once(char::is_whitespace).ok_or_else(|| PluginError::MalformedConfig {
            path: source_name.to_owned(),
            line: line_no,
            reason: format!("expected `<key> <value>`, got {line:?}"),
        })?;
        let value = resolve_value(key, value.trim());
        manager.configure(key, &value).map_err(|_| PluginError::MalformedConfig {
            path: source_name.to_owned(),
            line: line_no,
            reason: format!("unrecognised key {key:?}"),
        })?;
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stack::StackInstance;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AcceptAllAuthnFactory;

    struct NoopAuthn;

    #[async_trait]
    impl crate::application::security_service::Authn for NoopAuthn {
        fn impl_id(&self) -> String {
            "noop-authn".into()
        }

        async fn get_id_map(
            &self,
            _user: &str,
            _groups: &[String],
        ) -> Result<(crate::domain::identity::UserInfo, Vec<crate::domain::identity::GroupInfo>), crate::domain::errors::CatalogError>
        {
            Err(crate::domain::errors::CatalogError::InvalidArgument("not exercised by this test".into()))
        }
    }

    impl crate::application::plugin_manager::Factory<dyn crate::application::security_service::Authn> for AcceptAllAuthnFactory {
        fn impl_id(&self) -> String {
            "test-authn".into()
        }

        fn configure(&self, key: &str, _value: &str) -> Result<bool, PluginError> {
            Ok(key == "TokenId")
        }

        fn create(
            &self,
            _stack: &StackInstance,
            _inner: Option<Arc<dyn crate::application::security_service::Authn>>,
        ) -> Result<Arc<dyn crate::application::security_service::Authn>, PluginError> {
            Ok(Arc::new(NoopAuthn))
        }
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let manager = PluginManager::new();
        let mut loader = PluginLoader::new();
        let applied = apply_config("# a comment\n\n   \n", "test.conf", &manager, &mut loader).unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn unrecognised_key_fails_with_line_number() {
        let manager = PluginManager::new();
        let mut loader = PluginLoader::new();
        let err = apply_config("Nonsense value\n", "test.conf", &manager, &mut loader).unwrap_err();
        match err {
            PluginError::MalformedConfig { line, .. } => assert_eq!(line, 1),
            other => panic!("expected MalformedConfig, got {other:?}"),
        }
    }

    #[test]
    fn recognised_key_is_applied() {
        let manager = PluginManager::new();
        manager.register_authn_factory(Arc::new(AcceptAllAuthnFactory));
        let mut loader = PluginLoader::new();
        let applied = apply_config("TokenId dn\n", "test.conf", &manager, &mut loader).unwrap();
        assert_eq!(applied, 1);
    }

    #[test]
    fn malformed_load_plugin_directive_reports_line() {
        let manager = PluginManager::new();
        let mut loader = PluginLoader::new();
        let err = apply_config("LoadPlugin onlyonearg\n", "test.conf", &manager, &mut loader).unwrap_err();
        match err {
            PluginError::MalformedConfig { line, .. } => assert_eq!(line, 1),
            other => panic!("expected MalformedConfig, got {other:?}"),
        }
    }

    #[test]
    fn secret_key_prefers_environment_value() {
        std::env::set_var("MERIDIAN_TEST_TOKEN_SECRET", "from-env");
        assert_eq!(resolve_value("MERIDIAN_TEST_TOKEN_SECRET", "from-file"), "from-env");
        std::env::remove_var("MERIDIAN_TEST_TOKEN_SECRET");
        assert_eq!(resolve_value("MERIDIAN_TEST_TOKEN_SECRET", "from-file"), "from-file");
    }
}
