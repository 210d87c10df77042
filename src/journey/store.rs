//! Journey persistence over an injected key-value store

use chrono::Utc;
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::types::{UserJourneyState, UtmParams};
use crate::config::StorageKeys;
use crate::error::StoreError;

/// String key-value storage (browser storage, files, memory)
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-process store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves a half-written file
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path(key))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Loads and saves the journey aggregate
pub struct JourneyStateStore<S: KeyValueStore> {
    kv: S,
    keys: StorageKeys,
}

impl<S: KeyValueStore> JourneyStateStore<S> {
    pub fn new(kv: S, keys: StorageKeys) -> Self {
        Self { kv, keys }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// Fresh identity with zeroed metrics; nothing is persisted
    pub fn create_new_state(&self, source: Option<String>, utm: Option<UtmParams>) -> UserJourneyState {
        UserJourneyState::new(Utc::now(), source, utm)
    }

    /// Persisted state, or `None` when absent, unreadable or corrupt
    pub fn load(&self) -> Option<UserJourneyState> {
        let text = match self.kv.get(&self.keys.state) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!("could not read journey state: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("discarding corrupt journey state: {}", e);
                None
            }
        }
    }

    /// Stamp `last_updated` and persist the state, its leads and its analytics
    pub fn save(&mut self, state: &mut UserJourneyState) -> Result<(), StoreError> {
        state.last_updated = Utc::now();
        self.kv.set(&self.keys.state, &serde_json::to_string(state)?)?;
        self.kv.set(&self.keys.leads, &serde_json::to_string(&state.leads)?)?;
        self.kv.set(&self.keys.analytics, &serde_json::to_string(&state.analytics)?)?;
        Ok(())
    }

    /// Load, or create a new state, migrating a legacy email marker if present
    pub fn get_or_create(&mut self) -> UserJourneyState {
        if let Some(state) = self.load() {
            return state;
        }

        let mut state = self.create_new_state(None, None);
        match self.kv.get(&self.keys.legacy_email) {
            Ok(Some(email)) if !email.trim().is_empty() => {
                info!("migrating legacy email marker into new journey {}", state.user_id);
                state.profile.email = Some(email.trim().to_string());
                if let Err(e) = self.kv.remove(&self.keys.legacy_email) {
                    warn!("could not remove legacy email marker: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("could not read legacy email marker: {}", e),
        }
        state
    }

    /// Delete everything this store owns
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.kv.remove(&self.keys.state)?;
        self.kv.remove(&self.keys.leads)?;
        self.kv.remove(&self.keys.analytics)?;
        self.kv.remove(&self.keys.legacy_email)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> JourneyStateStore<MemoryStore> {
        JourneyStateStore::new(MemoryStore::new(), StorageKeys::default())
    }

    #[test]
    fn test_load_absent() {
        assert!(store().load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let mut s = store();
        let mut state = s.create_new_state(Some("newsletter".into()), None);
        let created = state.last_updated;
        s.save(&mut state).unwrap();

        assert!(state.last_updated >= created);
        let loaded = s.load().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.profile.source.as_deref(), Some("newsletter"));
        assert!(s.kv().get("pension_leads").unwrap().is_some());
        assert!(s.kv().get("pension_analytics").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_state_treated_as_absent() {
        let mut kv = MemoryStore::new();
        kv.set("pension_journey_state", "{not json").unwrap();
        let mut s = JourneyStateStore::new(kv, StorageKeys::default());

        assert!(s.load().is_none());
        let state = s.get_or_create();
        assert!(state.calculators.is_empty());
    }

    #[test]
    fn test_legacy_email_migrated_once() {
        let mut kv = MemoryStore::new();
        kv.set("pension_user_email", " lee@example.com ").unwrap();
        let mut s = JourneyStateStore::new(kv, StorageKeys::default());

        let state = s.get_or_create();
        assert_eq!(state.profile.email.as_deref(), Some("lee@example.com"));
        assert!(s.kv().get("pension_user_email").unwrap().is_none());
    }

    #[test]
    fn test_existing_state_wins_over_legacy_marker() {
        let mut s = store();
        let mut state = s.create_new_state(None, None);
        s.save(&mut state).unwrap();
        s.kv.set("pension_user_email", "old@example.com").unwrap();

        let loaded = s.get_or_create();
        assert_eq!(loaded.user_id, state.user_id);
        assert_eq!(loaded.profile.email, None);
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FileStore::new(dir.path().join("journey"));

        assert_eq!(files.get("k").unwrap(), None);
        files.set("k", "{\"a\":1}").unwrap();
        assert_eq!(files.get("k").unwrap().as_deref(), Some("{\"a\":1}"));
        files.remove("k").unwrap();
        files.remove("k").unwrap();
        assert_eq!(files.get("k").unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let mut s = store();
        let mut state = s.create_new_state(None, None);
        s.save(&mut state).unwrap();
        s.clear().unwrap();
        assert!(s.load().is_none());
    }
}
