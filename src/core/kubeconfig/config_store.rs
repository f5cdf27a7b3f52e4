use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::core::kubeconfig::raw_config::RawConfig;
use crate::core::util::clock::Clock;
use crate::core::util::ttl_cache::{cache_key, TtlCache};
use crate::errors::ConfigError;

pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(2);

/// Kubeconfig location when none is given: the first `KUBECONFIG` entry,
/// then `~/.kube/config`.
pub fn default_config_path() -> PathBuf {
    if let Some(raw) = env::var_os("KUBECONFIG") {
        if let Some(first) = env::split_paths(&raw).find(|p| !p.as_os_str().is_empty()) {
            return first;
        }
    }
    home::home_dir()
        .unwrap_or_default()
        .join(".kube")
        .join("config")
}

/// An empty path means "use the default location".
pub fn effective_config_path(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        default_config_path()
    } else {
        path.to_path_buf()
    }
}

/// Loads kubeconfig files and keeps each parsed result for a short TTL so
/// repeated lookups during one interaction do not re-read the disk.
pub struct ConfigStore {
    cache: TtlCache<Arc<RawConfig>>,
}

impl ConfigStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: TtlCache::new(ttl, clock),
        }
    }

    /// Returns the parsed kubeconfig at `path`. Failures are not cached.
    pub fn load(&self, path: &Path) -> Result<Arc<RawConfig>, ConfigError> {
        let path = effective_config_path(path);
        let key = cache_key(&path.to_string_lossy(), "");
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let yaml = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound { path: path.clone() },
            _ => ConfigError::ReadFailure {
                path: path.clone(),
                reason: e.to_string(),
            },
        })?;
        let raw = Arc::new(RawConfig::parse(&path, &yaml)?);
        debug!(path = %path.display(), profiles = raw.profile_names().len(), "kubeconfig loaded");

        self.cache.insert(key, raw.clone());
        Ok(raw)
    }

    pub fn list_profile_names(&self, path: &Path) -> Result<Vec<String>, ConfigError> {
        Ok(self.load(path)?.profile_names())
    }

    pub fn current_profile(&self, path: &Path) -> Result<String, ConfigError> {
        Ok(self.load(path)?.current_profile().to_string())
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kubeconfig::raw_config::tests::TWO_PROFILES;
    use crate::core::util::clock::ManualClock;
    use std::fs;

    fn store(clock: Arc<ManualClock>) -> ConfigStore {
        ConfigStore::new(DEFAULT_CONFIG_TTL, clock)
    }

    #[test]
    fn lists_sorted_profiles_and_current_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, TWO_PROFILES).unwrap();

        let store = store(Arc::new(ManualClock::new()));
        assert_eq!(store.list_profile_names(&path).unwrap(), vec!["dev", "prod"]);
        assert_eq!(store.current_profile(&path).unwrap(), "prod");
    }

    #[test]
    fn cached_result_survives_file_edits_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, TWO_PROFILES).unwrap();

        let clock = Arc::new(ManualClock::new());
        let store = store(clock.clone());
        let first = store.load(&path).unwrap();

        fs::write(
            &path,
            TWO_PROFILES.replace("current-context: prod", "current-context: dev"),
        )
        .unwrap();
        let second = store.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.current_profile(&path).unwrap(), "prod");

        clock.advance(DEFAULT_CONFIG_TTL + Duration::from_millis(1));
        assert_eq!(store.current_profile(&path).unwrap(), "dev");
    }

    #[test]
    fn clear_forces_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, TWO_PROFILES).unwrap();

        let store = store(Arc::new(ManualClock::new()));
        let first = store.load(&path).unwrap();
        store.clear();
        let second = store.load(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_and_empty_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(Arc::new(ManualClock::new()));

        let missing = dir.path().join("absent");
        assert!(matches!(store.load(&missing), Err(ConfigError::NotFound { .. })));

        let empty = dir.path().join("empty");
        fs::write(&empty, "").unwrap();
        assert!(matches!(store.load(&empty), Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "contexts: [broken").unwrap();

        let store = store(Arc::new(ManualClock::new()));
        assert!(matches!(store.load(&path), Err(ConfigError::Malformed { .. })));

        fs::write(&path, TWO_PROFILES).unwrap();
        assert!(store.load(&path).is_ok());
    }

    #[test]
    fn directory_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(Arc::new(ManualClock::new()));
        assert!(matches!(store.load(dir.path()), Err(ConfigError::ReadFailure { .. })));
    }
}
