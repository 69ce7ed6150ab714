//! Persistent storage for the auth token.
//!
//! The client reads the `AUTH_TOKEN_KEY` slot once at construction and writes
//! it on every `set_auth_token`. Backends only need `get/set/remove`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

/// Well-known key the client stores its bearer token under.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token store i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("token store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A pluggable key-value slot.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, TokenStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), TokenStoreError>;
    fn remove(&self, key: &str) -> Result<(), TokenStoreError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, as if persisted by an earlier process.
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.slots_mut().insert(key.to_string(), value.to_string());
        store
    }

    fn slots_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        Ok(self.slots_mut().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
        self.slots_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TokenStoreError> {
        self.slots_mut().remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object in a single file.
///
/// A missing file reads as empty. Every write rewrites the whole file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, TokenStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, slots: &HashMap<String, String>) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(slots)?)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), TokenStoreError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut slots = self.load()?;
        f(&mut slots);
        self.save(&slots)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
        self.update(|slots| {
            slots.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), TokenStoreError> {
        self.update(|slots| {
            slots.remove(key);
        })
    }
}
