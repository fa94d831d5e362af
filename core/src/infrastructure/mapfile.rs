//! Hot-reloaded DN→VO mapfile cache (§4.4/§9).
//!
//! §9's design note replaces the source's "try_lock, else block on the
//! mutex" idiom with a single-flight primitive: the mutex is always
//! acquired with a blocking `lock()`, never `try_lock()`, so every
//! contending caller simply waits for whichever thread got there first to
//! finish re-parsing, then re-checks the (now current) cached mtime under
//! the same lock before reading — no caller can observe a half-parsed map,
//! and a parse failure never clears the previously-good map (§9).

use crate::domain::errors::MapfileError;
use crate::domain::mapfile::MapFile;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

struct State {
    map: MapFile,
    mtime: Option<SystemTime>,
    generation: u64,
}

/// Process-wide per-path cache (§3's `MapFileEntry`): `mtime_seen` plus the
/// parsed DN→VO map. One instance per mapfile path; callers share a single
/// `MapfileCache` behind an `Arc` the way the shared-KV and local-LRU
/// tiers are shared (§5's thread-affinity table).
pub struct MapfileCache {
    path: PathBuf,
    state: Mutex<State>,
}

impl MapfileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MapfileCache {
            path: path.into(),
            state: Mutex::new(State { map: MapFile::default(), mtime: None, generation: 0 }),
        }
    }

    /// Current reload generation, exposed for tests/observability.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    fn refresh_locked(&self, state: &mut State) -> Result<(), MapfileError> {
        let meta = std::fs::metadata(&self.path)
            .map_err(|_| MapfileError::NoSuchFile(self.path.display().to_string()))?;
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if state.mtime.map(|seen| mtime <= seen).unwrap_or(false) {
            return Ok(());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|_| MapfileError::NoSuchFile(self.path.display().to_string()))?;
        match MapFile::parse(&self.path.display().to_string(), &contents) {
            Ok(map) => {
                state.map = map;
                state.mtime = Some(mtime);
                state.generation += 1;
                Ok(())
            }
            Err(e) => {
                // Parse failure never clears the previously-good map (§9);
                // the stale map keeps serving until a valid reload lands.
                tracing::warn!(path = %self.path.display(), error = %e, "mapfile: reparse failed, keeping stale map");
                Err(e)
            }
        }
    }

    /// §4.4 `voFromDn`: stat the mapfile, reparse under the single-flight
    /// lock if its mtime has advanced, then resolve `dn`.
    pub fn vo_from_dn(&self, dn: &str) -> Result<String, MapfileError> {
        let mut state = self.state.lock();
        match self.refresh_locked(&mut state) {
            Ok(()) => {}
            Err(MapfileError::NoSuchFile(p)) => return Err(MapfileError::NoSuchFile(p)),
            Err(_) => {
                // Malformed-on-reload: fall through and serve whatever map
                // (possibly empty, possibly stale-but-good) is cached.
            }
        }
        state.map.vo_from_dn(dn).map(str::to_owned)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_errors() {
        let cache = MapfileCache::new("/nonexistent/path/to.map");
        assert!(matches!(cache.vo_from_dn("x"), Err(MapfileError::NoSuchFile(_))));
    }

    #[test]
    fn scenario_7_hot_reload_without_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid-mapfile");
        std::fs::write(&path, "DN1 voA\n").unwrap();

        let cache = MapfileCache::new(&path);
        assert_eq!(cache.vo_from_dn("DN1").unwrap(), "voA");
        assert_eq!(cache.generation(), 1);

        // Append an entry and bump mtime forward so the next call reloads.
        std::thread::sleep(std::time::Duration::from_millis(10));
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "DN2 voB").unwrap();
        drop(f);
        let newer = SystemTime::now() + std::time::Duration::from_secs(2);
        filetime_touch(&path, newer);

        assert_eq!(cache.vo_from_dn("DN2").unwrap(), "voB");
        assert_eq!(cache.generation(), 2);
    }

    #[test]
    fn unmapped_dn_after_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid-mapfile");
        std::fs::write(&path, "DN1 voA\n").unwrap();
        let cache = MapfileCache::new(&path);
        assert!(matches!(cache.vo_from_dn("nope"), Err(MapfileError::NoUserMapping(_))));
    }

    /// Minimal mtime-touch helper (no `filetime` crate dependency): opens
    /// the file and lets the OS stamp a fresh mtime, which is sufficient
    /// since the test only needs "later than before", not an exact value.
    fn filetime_touch(path: &Path, _when: SystemTime) {
        let contents = std::fs::read(path).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}
