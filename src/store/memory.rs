//! In-memory storage backend.
//!
//! [`InMemoryBackend`] provides a thread-safe [`StorageBackend`] using
//! `DashMap<String, (Vec<u8>, u64)>`. It is a dumb KV store with no domain
//! logic; wrap it in [`DocumentStore`] to get the pipeline traits.
//!
//! # Examples
//!
//! ```
//! use task_reminders::store::memory::InMemoryStore;
//!
//! let store = InMemoryStore::in_memory();
//! assert!(store.backend().is_empty());
//! ```

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::backend::{StorageBackend, StorageError, VersionedRecord};
use crate::store::document::DocumentStore;

/// A [`DocumentStore`] over an [`InMemoryBackend`].
pub type InMemoryStore = DocumentStore<InMemoryBackend>;

impl DocumentStore<InMemoryBackend> {
    /// Creates an empty in-memory document store.
    pub fn in_memory() -> Self {
        Self::new(InMemoryBackend::new())
    }
}

impl Default for DocumentStore<InMemoryBackend> {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Thread-safe in-memory storage backend using [`DashMap`].
///
/// Stores documents as `(bytes, version)` tuples where the version starts
/// at 1.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: DashMap<String, (Vec<u8>, u64)>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Writes raw bytes under `key`, bypassing all validation.
    ///
    /// Lets tests and migrations plant documents the domain layer would
    /// never produce.
    pub fn insert_raw(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        let key = key.into();
        let version = self.data.get(&key).map_or(1, |entry| entry.value().1 + 1);
        self.data.insert(key, (data.into(), version));
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError> {
        let entry = self.data.get(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })?;
        let (data, version) = entry.value();
        Ok(VersionedRecord {
            data: data.clone(),
            version: *version,
        })
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<u64, StorageError> {
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| (Vec::new(), 0));
        let new_version = entry.value().1 + 1;
        *entry.value_mut() = (data.to_vec(), new_version);
        Ok(new_version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let mut entry = self
            .data
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        let current_version = entry.value().1;
        if current_version != expected_version {
            return Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }
        let new_version = current_version + 1;
        *entry.value_mut() = (data.to_vec(), new_version);
        Ok(new_version)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError> {
        let mut results: Vec<(String, VersionedRecord)> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| {
                let (data, version) = entry.value();
                (
                    entry.key().clone(),
                    VersionedRecord {
                        data: data.clone(),
                        version: *version,
                    },
                )
            })
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }
}
