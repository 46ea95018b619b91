//! Local key-value preference store. Each key is one JSON file under the
//! prefs directory. Reads fall back to defaults, writes through `persist`
//! never fail from the caller's point of view.

pub mod favorites;
pub mod history;
pub mod settings;

use crate::config::AppConfig;
use crate::error::AppResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use favorites::Favorites;
pub use history::{History, HistoryEntry};
pub use settings::Settings;

pub const KEY_FAVORITES: &str = "favorites";
pub const KEY_HISTORY: &str = "history";
pub const KEY_VOLUME: &str = "volume";
pub const KEY_MUTED: &str = "muted";
pub const KEY_BASS_BOOST: &str = "bass_boost";
pub const KEY_SETTINGS: &str = "settings";
pub const KEY_PRESENCE_ENABLED: &str = "presence_enabled";
pub const KEY_QUEUE: &str = "queue";

pub const DEFAULT_VOLUME: f32 = 0.8;

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    dir: PathBuf,
}

impl PreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<config_dir>/prefs`.
    pub fn open_default() -> AppResult<Self> {
        Ok(Self::new(AppConfig::prefs_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Raw JSON value for `key`, or `None` when absent or unreadable.
    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("[store] Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("[store] Corrupt value for '{}': {}", key, e);
                None
            }
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("[store] Unexpected shape for '{}': {}", key, e);
                None
            }
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Write `value` under `key`: serialize to a temp file, then rename over
    /// the previous file.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(value)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Like `set`, but failures are logged and swallowed.
    pub fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.set(key, value) {
            log::warn!("[store] Failed to persist '{}': {}", key, e);
        }
    }

    pub fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("[store] Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    pub fn volume(&self) -> f32 {
        self.get::<f32>(KEY_VOLUME)
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_VOLUME)
    }

    pub fn muted(&self) -> bool {
        self.get_or(KEY_MUTED, false)
    }

    pub fn bass_boost(&self) -> f32 {
        self.get::<f32>(KEY_BASS_BOOST)
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 15.0))
            .unwrap_or(0.0)
    }

    pub fn presence_enabled(&self) -> bool {
        self.get_or(KEY_PRESENCE_ENABLED, true)
    }

    pub fn set_presence_enabled(&self, enabled: bool) {
        self.persist(KEY_PRESENCE_ENABLED, &enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_keys_use_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path());
        assert_eq!(store.volume(), DEFAULT_VOLUME);
        assert!(!store.muted());
        assert_eq!(store.bass_boost(), 0.0);
        assert!(store.presence_enabled());
    }

    #[test]
    fn values_survive_a_new_store() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path().join("prefs"));
        store.persist(KEY_VOLUME, &0.25f32);
        store.persist(KEY_BASS_BOOST, &40.0f32);
        store.set_presence_enabled(false);

        let reopened = PreferenceStore::new(dir.path().join("prefs"));
        assert_eq!(reopened.volume(), 0.25);
        assert_eq!(reopened.bass_boost(), 15.0);
        assert!(!reopened.presence_enabled());
    }

    #[test]
    fn corrupt_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("volume.json"), "{not json").unwrap();
        let store = PreferenceStore::new(dir.path());
        assert_eq!(store.volume(), DEFAULT_VOLUME);
    }

    #[test]
    fn write_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // prefs dir cannot be created beneath a regular file
        let store = PreferenceStore::new(blocker.join("prefs"));
        assert!(store.set(KEY_MUTED, &true).is_err());
        store.persist(KEY_MUTED, &true);
        assert!(!store.muted());
    }
}
