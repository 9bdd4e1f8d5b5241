use crate::error::AppResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ACTIVE_GROUP_FILTER_KEY: &str = "active_group_filter";
pub const LAST_USED_GROUPS_KEY: &str = "last_used_groups";
pub const FORM_DEFAULTS_KEY: &str = "form_defaults";

/// Storage-agnostic key-value port for user settings.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> AppResult<()>;
    fn remove(&mut self, key: &str) -> AppResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> AppResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> AppResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Defaults pre-filled into the create form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDefaults {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub repeat_interval_minutes: u32,
    pub max_repeats: u32,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            days: 0,
            hours: 2,
            minutes: 0,
            repeat_interval_minutes: 0,
            max_repeats: 1,
        }
    }
}

/// Typed view over the preference keys. Values are read once at load time; every setter
/// writes through to the backing store.
pub struct Preferences {
    store: Box<dyn KeyValueStore>,
    active_group_filter: Option<i64>,
    last_used_groups: Vec<i64>,
    form_defaults: FormDefaults,
}

impl Preferences {
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let active_group_filter =
            read_json::<Option<i64>>(store.as_ref(), ACTIVE_GROUP_FILTER_KEY).flatten();
        let last_used_groups =
            read_json::<Vec<i64>>(store.as_ref(), LAST_USED_GROUPS_KEY).unwrap_or_default();
        let form_defaults = read_json::<FormDefaults>(store.as_ref(), FORM_DEFAULTS_KEY)
            .map(sanitize_defaults)
            .unwrap_or_default();

        Self {
            store,
            active_group_filter,
            last_used_groups,
            form_defaults,
        }
    }

    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryKeyValueStore::default()))
    }

    pub fn active_group_filter(&self) -> Option<i64> {
        self.active_group_filter
    }

    pub fn set_active_group_filter(&mut self, group: Option<i64>) -> AppResult<()> {
        self.active_group_filter = group;
        match group {
            Some(id) => self.store.set(ACTIVE_GROUP_FILTER_KEY, id.to_string()),
            None => self.store.remove(ACTIVE_GROUP_FILTER_KEY),
        }
    }

    pub fn last_used_groups(&self) -> &[i64] {
        &self.last_used_groups
    }

    pub fn set_last_used_groups(&mut self, groups: Vec<i64>) -> AppResult<()> {
        let encoded = serde_json::to_string(&groups)?;
        self.last_used_groups = groups;
        self.store.set(LAST_USED_GROUPS_KEY, encoded)
    }

    pub fn form_defaults(&self) -> FormDefaults {
        self.form_defaults
    }

    pub fn set_form_defaults(&mut self, defaults: FormDefaults) -> AppResult<()> {
        let defaults = sanitize_defaults(defaults);
        let encoded = serde_json::to_string(&defaults)?;
        self.form_defaults = defaults;
        self.store.set(FORM_DEFAULTS_KEY, encoded)
    }
}

fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring stored preference {}: {}", key, e);
            None
        }
    }
}

fn sanitize_defaults(mut defaults: FormDefaults) -> FormDefaults {
    defaults.max_repeats = defaults.max_repeats.max(1);
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::FileKeyValueStore;
    use tempfile::tempdir;

    #[test]
    fn test_missing_values_fall_back_to_defaults() {
        let prefs = Preferences::in_memory();
        assert_eq!(prefs.active_group_filter(), None);
        assert!(prefs.last_used_groups().is_empty());
        assert_eq!(prefs.form_defaults(), FormDefaults::default());
    }

    #[test]
    fn test_garbage_values_fall_back_to_defaults() {
        let mut kv = MemoryKeyValueStore::default();
        kv.set(ACTIVE_GROUP_FILTER_KEY, "four".to_string()).unwrap();
        kv.set(LAST_USED_GROUPS_KEY, "{".to_string()).unwrap();
        kv.set(FORM_DEFAULTS_KEY, "[]".to_string()).unwrap();

        let prefs = Preferences::load(Box::new(kv));
        assert_eq!(prefs.active_group_filter(), None);
        assert!(prefs.last_used_groups().is_empty());
        assert_eq!(prefs.form_defaults(), FormDefaults::default());
    }

    #[test]
    fn test_values_are_written_through() {
        let dir = tempdir().unwrap();
        let mut kv = FileKeyValueStore::open(dir.path()).unwrap();
        kv.set(ACTIVE_GROUP_FILTER_KEY, "3".to_string()).unwrap();
        kv.set(LAST_USED_GROUPS_KEY, "[3,5]".to_string()).unwrap();
        let mut prefs = Preferences::load(Box::new(kv));
        assert_eq!(prefs.active_group_filter(), Some(3));
        assert_eq!(prefs.last_used_groups(), &[3, 5]);

        prefs.set_active_group_filter(None).unwrap();
        prefs.set_last_used_groups(vec![7]).unwrap();
        prefs
            .set_form_defaults(FormDefaults { max_repeats: 0, hours: 1, ..FormDefaults::default() })
            .unwrap();

        // read back from disk, not from the instance that wrote it
        let stored = FileKeyValueStore::open(dir.path()).unwrap();
        assert_eq!(stored.get(ACTIVE_GROUP_FILTER_KEY), None);
        assert_eq!(stored.get(LAST_USED_GROUPS_KEY).as_deref(), Some("[7]"));
        let defaults: FormDefaults =
            serde_json::from_str(&stored.get(FORM_DEFAULTS_KEY).unwrap()).unwrap();
        assert_eq!(defaults.max_repeats, 1);
        assert_eq!(defaults.hours, 1);

        let reloaded = Preferences::load(Box::new(stored));
        assert_eq!(reloaded.active_group_filter(), None);
        assert_eq!(reloaded.last_used_groups(), &[7]);
        assert_eq!(reloaded.form_defaults(), defaults);
    }
}
