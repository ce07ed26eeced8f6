use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub const CONFIG_KEY: &str = "prompt-config";
pub const PROFILES_KEY: &str = "test-profiles";
pub const LAST_SYNC_KEY: &str = "last-sync";

/// Advisory key-value storage: one JSON file per key under a directory.
///
/// Reads fall back and writes are fire-and-forget; nothing here returns an
/// error to the caller.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe_key = key.replace(['/', '\\'], "-");
        self.dir.join(format!("{safe_key}.json"))
    }

    pub fn load_local<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let path = self.path_for(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No local entry for '{key}'");
                return fallback;
            }
            Err(e) => {
                log::warn!("Failed to read local entry '{key}' from {}: {e}", path.display());
                return fallback;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Ignoring corrupt local entry '{key}': {e}");
                fallback
            }
        }
    }

    pub fn save_local<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_save(key, value) {
            log::warn!("Failed to save local entry '{key}': {e}");
        }
    }

    fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), crate::error::WorkbenchError> {
        fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string_pretty(value)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
