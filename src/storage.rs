//! Storage adapters for the purchases SDK

use std::collections::HashMap;
#[cfg(feature = "native-storage")]
use std::path::Path;
use std::sync::RwLock;

/// Storage keys
pub mod keys {
    pub const APP_USER_ID: &str = concat!("purchases:", "app_user_id");
    pub const ATTRIBUTION_PREFIX: &str = concat!("purchases:", "attribution:");
    pub const ATTRIBUTES_PREFIX: &str = concat!("purchases:", "attributes:");

    /// Key holding the sent-attribution record for one app user
    pub fn attribution(app_user_id: &str) -> String {
        format!("{}{}", ATTRIBUTION_PREFIX, app_user_id)
    }

    /// Key holding the subscriber attributes for one app user
    pub fn attributes(app_user_id: &str) -> String {
        format!("{}{}", ATTRIBUTES_PREFIX, app_user_id)
    }
}

/// Storage adapter trait for custom storage implementations
pub trait StorageAdapter: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &str) -> Option<String>;

    /// Set a value by key
    fn set(&self, key: &str, value: &str);

    /// Remove a value by key
    fn remove(&self, key: &str);
}

/// In-memory storage, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut data) = self.data.write() {
            data.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut data) = self.data.write() {
            data.remove(key);
        }
    }
}

/// File-based storage adapter
///
/// Stores SDK state in `purchases.json` within the specified directory.
#[cfg(feature = "native-storage")]
pub struct FileStorage {
    path: std::path::PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

#[cfg(feature = "native-storage")]
impl FileStorage {
    /// Create a new file storage in the given directory.
    ///
    /// # Returns
    /// `None` if the directory doesn't exist or isn't accessible.
    pub fn new(storage_dir: &Path) -> Option<Self> {
        if !storage_dir.is_dir() {
            return None;
        }

        let path = storage_dir.join("purchases.json");

        let cache = if path.exists() {
            let contents = std::fs::read_to_string(&path).ok()?;
            serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable storage file {}: {}", path.display(), e);
                HashMap::new()
            })
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
            && let Err(e) = std::fs::write(&self.path, contents)
        {
            tracing::error!("Failed to write {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(feature = "native-storage")]
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

#[cfg(feature = "native-storage")]
impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}
