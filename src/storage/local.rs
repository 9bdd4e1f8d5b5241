use crate::error::AppResult;
use crate::preferences::KeyValueStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const PREFERENCES_FILE: &str = "preferences.json";

/// Key-value port backed by a JSON object in the app data directory.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileKeyValueStore {
    /// Open the store under `app_data_path`, creating the directory if needed.
    /// A missing or unreadable file starts out empty.
    pub fn open(app_data_path: &Path) -> AppResult<Self> {
        fs::create_dir_all(app_data_path)?;
        let path = app_data_path.join(PREFERENCES_FILE);
        let values = load_local(&path);
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_local(&self) -> AppResult<()> {
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn load_local(path: &Path) -> BTreeMap<String, String> {
    if !path.exists() {
        return BTreeMap::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Could not read {}: {}, using defaults", path.display(), e);
            return BTreeMap::new();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("Ignoring malformed {}: {}", path.display(), e);
        BTreeMap::new()
    })
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> AppResult<()> {
        self.values.insert(key.to_string(), value);
        self.save_local()
    }

    fn remove(&mut self, key: &str) -> AppResult<()> {
        if self.values.remove(key).is_some() {
            self.save_local()?;
        }
        Ok(())
    }
}
