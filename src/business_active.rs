use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

pub const ACTIVE_BUSINESS_KEY: &str = "activeBusinessId";

/// Hard-coded tenant used when nothing has been selected yet. Matches the
/// seed business shipped in the mock store so a fresh install always has a
/// working tenant.
pub const DEFAULT_BUSINESS_ID: &str = "biz-0001";

trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn save(&self) -> anyhow::Result<()>;
}

/// Durable local key-value store backed by a JSON file, the library analogue
/// of the browser's persistent storage.
struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStore {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Ok(FileStore {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        let snapshot = self
            .data
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create settings dir {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("write settings file {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn SettingsStore + Send + Sync>,
}

impl StoreHandle {
    pub fn file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            inner: Arc::new(FileStore::open(path)?),
        })
    }

    /// Default on-disk location for the settings file.
    pub fn default_file() -> anyhow::Result<Self> {
        let base = dirs::data_dir().context("no platform data directory")?;
        Self::file(&base.join("glowdesk").join("settings.json"))
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    fn read_active(&self) -> Option<String> {
        self.inner.get(ACTIVE_BUSINESS_KEY)
    }

    fn write_active(&self, id: &str) {
        self.inner.set(ACTIVE_BUSINESS_KEY, id);
    }

    fn persist(&self) -> anyhow::Result<()> {
        self.inner.save()
    }

    pub fn snapshot(&self) -> Option<String> {
        self.read_active()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActiveSetError {
    #[error("business id must not be empty")]
    EmptyId,
}

/// Returns the persisted tenant id, installing the default when the stored
/// value is missing or empty.
pub fn get_active_business_id(store: &StoreHandle) -> String {
    let fallback_reason = match store.read_active() {
        Some(candidate) if !candidate.trim().is_empty() => return candidate,
        Some(_) => "empty",
        None => "missing",
    };

    store.write_active(DEFAULT_BUSINESS_ID);
    if let Err(err) = store.persist() {
        warn!(
            target: "glowdesk",
            event = "active_business_store_save_failed",
            error = %err
        );
    }
    info!(
        target: "glowdesk",
        event = "active_business_fallback",
        reason = fallback_reason,
        chosen_id = DEFAULT_BUSINESS_ID
    );
    DEFAULT_BUSINESS_ID.to_string()
}

pub fn set_active_business_id(store: &StoreHandle, id: &str) -> Result<(), ActiveSetError> {
    if id.trim().is_empty() {
        warn!(
            target: "glowdesk",
            event = "active_business_set_rejected",
            reason = "empty"
        );
        return Err(ActiveSetError::EmptyId);
    }
    store.write_active(id);
    if let Err(err) = store.persist() {
        warn!(
            target: "glowdesk",
            event = "active_business_store_save_failed",
            error = %err
        );
    }
    info!(
        target: "glowdesk",
        event = "active_business_changed",
        id = %id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_installs_default_when_missing() {
        let store = StoreHandle::in_memory();
        let active = get_active_business_id(&store);
        assert_eq!(active, DEFAULT_BUSINESS_ID);
        assert_eq!(store.snapshot().as_deref(), Some(DEFAULT_BUSINESS_ID));
    }

    #[test]
    fn get_recovers_from_blank_entry() {
        let store = StoreHandle::in_memory();
        store.write_active("   ");
        assert_eq!(get_active_business_id(&store), DEFAULT_BUSINESS_ID);
    }

    #[test]
    fn set_rejects_empty_id_and_keeps_previous_value() {
        let store = StoreHandle::in_memory();
        set_active_business_id(&store, "biz-0002").unwrap();
        let err = set_active_business_id(&store, "").unwrap_err();
        assert_eq!(err, ActiveSetError::EmptyId);
        assert_eq!(store.snapshot().as_deref(), Some("biz-0002"));
    }
}
