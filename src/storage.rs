//! Client-local storage for the bearer token and pending-payment payloads.
//!
//! The embedding application owns the token lifecycle (sign-in, refresh,
//! sign-out); the SDK only reads it. The pending-payment key lets a host
//! application resume an interrupted transfer flow after a restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Well-known storage keys.
pub mod keys {
    pub const TOKEN: &str = concat!("telecare:", "token");
    pub const PENDING_PAYMENT: &str = concat!("telecare:", "pending_payment");
}

/// Storage adapter trait for custom storage implementations.
pub trait StorageAdapter: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &str) -> Option<String>;

    /// Set a value by key
    fn set(&self, key: &str, value: &str);

    /// Remove a value by key
    fn remove(&self, key: &str);
}

/// In-memory storage adapter. The default; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    cache: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(key);
        }
    }
}

/// File-based storage adapter.
///
/// Stores client state in `telecare.json` within the specified directory.
pub struct FileStorage {
    path: std::path::PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Create a new file storage in the given directory.
    ///
    /// The directory must exist and be writable.
    ///
    /// # Returns
    /// `None` if the directory doesn't exist or isn't accessible.
    pub fn new(storage_dir: &Path) -> Option<Self> {
        if !storage_dir.is_dir() {
            return None;
        }

        let path = storage_dir.join("telecare.json");

        let cache = if path.exists() {
            let contents = std::fs::read_to_string(&path).ok()?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Some(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    fn save(&self) {
        if let Ok(cache) = self.cache.read()
            && let Ok(contents) = serde_json::to_string_pretty(&*cache)
        {
            let _ = std::fs::write(&self.path, contents);
        }
    }
}

impl StorageAdapter for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key.to_string(), value.to_string());
        }
        self.save();
    }

    fn remove(&self, key: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(key);
        }
        self.save();
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}
