// milhouse-config/src/cache.rs
// ============================================================================
// Module: Configuration Cache
// Description: Memoizes a loaded config per working directory.
// Purpose: Avoid re-reading and re-parsing config.yaml on every phase
//          transition within one CLI invocation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`ConfigCache`] is a process-wide memo keyed by the repo root path.
//! Loading is the expensive part (disk read, migration, validation); once a
//! root has been loaded successfully within a process, subsequent
//! `get_or_load` calls for the same root return the cached value without
//! touching the filesystem again. [`ConfigCache::invalidate`] drops one
//! entry after a write (e.g. a migration that rewrote the file on disk);
//! [`ConfigCache::reset`] clears the whole cache and exists for tests that
//! must not leak state between cases sharing the same process.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;

use crate::error::ConfigError;
use crate::load::load_config;
use crate::schema::MilhouseConfig;

fn store() -> &'static Mutex<HashMap<PathBuf, MilhouseConfig>> {
    static STORE: OnceLock<Mutex<HashMap<PathBuf, MilhouseConfig>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Process-wide memoized config loader, keyed by repo root.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigCache;

impl ConfigCache {
    /// Returns the cached config for `root`, loading and caching it from
    /// `<root>/config.yaml` on first access.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if no cached entry exists and loading fails.
    #[allow(clippy::unused_self, reason = "instance method keeps call sites symmetric with a future per-instance cache")]
    pub fn get_or_load(self, root: &Path) -> Result<MilhouseConfig, ConfigError> {
        #[allow(clippy::unwrap_used, reason = "the mutex is never held across a panic in this crate")]
        let mut guard = store().lock().unwrap();
        if let Some(config) = guard.get(root) {
            return Ok(config.clone());
        }
        let config = load_config(&crate::load::default_config_path(root))?;
        guard.insert(root.to_path_buf(), config.clone());
        Ok(config)
    }

    /// Drops the cached entry for `root`, if any, forcing the next
    /// `get_or_load` call to re-read the file.
    #[allow(clippy::unused_self, reason = "instance method keeps call sites symmetric with a future per-instance cache")]
    pub fn invalidate(self, root: &Path) {
        #[allow(clippy::unwrap_used, reason = "the mutex is never held across a panic in this crate")]
        store().lock().unwrap().remove(root);
    }

    /// Clears every cached entry. Intended for test isolation; production
    /// call sites should prefer [`Self::invalidate`].
    #[allow(clippy::unused_self, reason = "instance method keeps call sites symmetric with a future per-instance cache")]
    pub fn reset(self) {
        #[allow(clippy::unwrap_used, reason = "the mutex is never held across a panic in this crate")]
        store().lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]

    use std::fs;

    use tempfile::tempdir;

    use super::ConfigCache;

    #[test]
    fn second_load_does_not_touch_disk() {
        let dir = tempdir().expect("create tempdir");
        fs::write(dir.path().join("config.yaml"), "version: \"1.0\"\nproject:\n  name: first\n").expect("write fixture");

        let cache = ConfigCache;
        cache.reset();
        let first = cache.get_or_load(dir.path()).expect("first load reads disk");
        assert_eq!(first.project.name.as_deref(), Some("first"));

        fs::write(dir.path().join("config.yaml"), "version: \"1.0\"\nproject:\n  name: second\n").expect("overwrite fixture");
        let second = cache.get_or_load(dir.path()).expect("second load is served from cache");
        assert_eq!(second.project.name.as_deref(), Some("first"));

        cache.invalidate(dir.path());
        let third = cache.get_or_load(dir.path()).expect("third load re-reads disk after invalidation");
        assert_eq!(third.project.name.as_deref(), Some("second"));
    }
}
