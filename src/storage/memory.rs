// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory persistence adapter.
//!
//! The default backend: slots live for the lifetime of the process.
//! Also the backend used throughout the test suite.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{PersistenceAdapter, StorageError};

/// Process-local key/value store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let slots = self
            .slots
            .lock()
            .map_err(|e| StorageError::Read(e.to_string()))?;
        Ok(slots.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| StorageError::Write(e.to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| StorageError::Write(e.to_string()))?;
        slots.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("missing").await.unwrap(), None);

        storage.set("slot", "value").await.unwrap();
        assert_eq!(storage.get("slot").await.unwrap().as_deref(), Some("value"));

        storage.set("slot", "replaced").await.unwrap();
        assert_eq!(
            storage.get("slot").await.unwrap().as_deref(),
            Some("replaced")
        );

        storage.remove("slot").await.unwrap();
        assert_eq!(storage.get("slot").await.unwrap(), None);

        // Removing an absent slot is fine.
        storage.remove("slot").await.unwrap();
    }
}
