//! Key-value persistence for replay state and pluggable state encoding

use crate::error::{SerializationError, StorageError};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Minimal string key-value store the tracking engine persists through
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for Arc<K> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for &K {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

/// In-process store, scoped to the lifetime of the value
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut entries = self.entries.write().map_err(|e| StorageError::WriteFailed {
            key: key.to_string(),
            reason: format!("store lock poisoned: {}", e),
        })?;
        Ok(entries.remove(key))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|e| StorageError::ReadFailed {
            key: key.to_string(),
            reason: format!("store lock poisoned: {}", e),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|e| StorageError::WriteFailed {
            key: key.to_string(),
            reason: format!("store lock poisoned: {}", e),
        })?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Trait for pluggable state encoding into store values
pub trait StateSerializer: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, SerializationError>;

    fn decode<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, SerializationError>;

    /// Get the name of this encoding
    fn name(&self) -> &str;
}

/// JSON encoding backend
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl StateSerializer for JsonSerializer {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, SerializationError> {
        serde_json::to_string(value).map_err(|e| SerializationError::SerializationFailed {
            reason: format!("JSON serialization failed: {}", e),
        })
    }

    fn decode<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, SerializationError> {
        serde_json::from_str(encoded).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("JSON deserialization failed: {}", e),
        })
    }

    fn name(&self) -> &str {
        "json"
    }
}
