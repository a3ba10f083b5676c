//! Document store with all domain logic delegating to a [`StorageBackend`].
//!
//! [`DocumentStore`] implements every store-side operation of the reminder
//! pipeline on top of any backend:
//!
//! - schema validation at the storage boundary, with malformed task
//!   records quarantined (reported, skipped) rather than failing the query;
//! - the due-task filter and key-ordered cursor paging;
//! - CAS-based `reminded_at` marking;
//! - delivery-token upsert and lookup.
//!
//! Backends remain dumb key-value stores; all intelligence lives here.
//!
//! # Owner Scoping
//!
//! Token records are keyed by owner id. A decoded token whose embedded
//! owner disagrees with its key is treated as absent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::constants::{TASKS_COLLECTION, TOKENS_COLLECTION};
use crate::domain::{DeliveryToken, Task};
use crate::error::StoreError;
use crate::store::backend::{make_key, make_prefix, parse_key, StorageBackend, StorageError};
use crate::store::{DuePage, DueQuery, TaskSource, TokenStore};

/// Generic document store over a [`StorageBackend`].
///
/// # Type Parameters
///
/// * `B` - A [`StorageBackend`] implementation (in-memory, filesystem, ...)
#[derive(Debug)]
pub struct DocumentStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> DocumentStore<B> {
    /// Creates a document store backed by `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn map_storage_error(err: StorageError) -> StoreError {
        match err {
            StorageError::NotFound { key } => StoreError::NotFound { key },
            StorageError::VersionConflict { key, .. } => StoreError::Conflict { key },
            StorageError::Backend { message, .. } => StoreError::Backend(message),
        }
    }

    fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value)
            .map_err(|e| StoreError::Backend(format!("failed to serialize {key}: {e}")))
    }

    // ---- Task documents ----

    /// Validates and stores a task, replacing any previous version.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Malformed`] if the task fails validation.
    /// - [`StoreError::Backend`] on backend failures.
    pub async fn put_task(&self, task: &Task) -> Result<u64, StoreError> {
        let key = make_key(TASKS_COLLECTION, &task.id);
        task.validate().map_err(|reason| StoreError::Malformed {
            key: key.clone(),
            reason,
        })?;
        let bytes = Self::encode(&key, task)?;
        self.backend
            .put(&key, &bytes)
            .await
            .map_err(Self::map_storage_error)
    }

    /// Fetches a task by id.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no such task exists.
    /// - [`StoreError::Malformed`] if the stored document is invalid.
    pub async fn get_task(&self, task_id: &str) -> Result<Task, StoreError> {
        let key = make_key(TASKS_COLLECTION, task_id);
        let versioned = self
            .backend
            .get(&key)
            .await
            .map_err(Self::map_storage_error)?;
        Task::from_document(&key, task_id, &versioned.data)
    }

    /// Deletes a task. Returns `true` if it existed.
    pub async fn delete_task(&self, task_id: &str) -> Result<bool, StoreError> {
        self.backend
            .delete(&make_key(TASKS_COLLECTION, task_id))
            .await
            .map_err(Self::map_storage_error)
    }
}

#[async_trait]
impl<B: StorageBackend + 'static> TaskSource for DocumentStore<B> {
    async fn query_due(
        &self,
        query: &DueQuery,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DuePage, StoreError> {
        let limit = limit.max(1);
        let records = self
            .backend
            .list_by_prefix(&make_prefix(TASKS_COLLECTION))
            .await
            .map_err(Self::map_storage_error)?;

        let mut page = DuePage::default();
        let mut remaining = records
            .into_iter()
            .filter(|(key, _)| cursor.is_none_or(|c| key.as_str() > c))
            .peekable();

        while let Some((key, versioned)) = remaining.next() {
            let doc_id = parse_key(&key).map_or("", |(_, id)| id);
            match Task::from_document(&key, doc_id, &versioned.data) {
                Ok(task) if query.matches(&task) => {
                    page.tasks.push(task);
                    if page.tasks.len() >= limit {
                        if remaining.peek().is_some() {
                            page.next_cursor = Some(key);
                        }
                        break;
                    }
                },
                Ok(_) => {},
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "quarantined malformed task document");
                    page.malformed.push(key);
                },
            }
        }

        Ok(page)
    }

    async fn mark_reminded(&self, task_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let key = make_key(TASKS_COLLECTION, task_id);
        let versioned = self
            .backend
            .get(&key)
            .await
            .map_err(Self::map_storage_error)?;
        // Validate, then patch the stored document so fields this crate does
        // not model (and their encodings) are left exactly as written.
        Task::from_document(&key, task_id, &versioned.data)?;
        let mut document: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&versioned.data).map_err(|e| StoreError::Malformed {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        let marker = serde_json::to_value(at)
            .map_err(|e| StoreError::Backend(format!("failed to serialize {key}: {e}")))?;
        document.insert("remindedAt".to_string(), marker);

        let bytes = Self::encode(&key, &document)?;
        self.backend
            .put_if_version(&key, &bytes, versioned.version)
            .await
            .map_err(Self::map_storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl<B: StorageBackend + 'static> TokenStore for DocumentStore<B> {
    async fn get_token(&self, owner_id: &str) -> Result<Option<DeliveryToken>, StoreError> {
        let key = make_key(TOKENS_COLLECTION, owner_id);
        let versioned = match self.backend.get(&key).await {
            Ok(versioned) => versioned,
            Err(StorageError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(Self::map_storage_error(e)),
        };
        let record = DeliveryToken::from_document(&key, owner_id, &versioned.data)?;
        if record.owner_id != owner_id {
            tracing::warn!(
                key = %key,
                expected_owner = owner_id,
                actual_owner = %record.owner_id,
                "owner mismatch on delivery token (treating as absent)"
            );
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn put_token(
        &self,
        owner_id: &str,
        token: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<DeliveryToken, StoreError> {
        let key = make_key(TOKENS_COLLECTION, owner_id);
        let record = DeliveryToken::new(owner_id, token, updated_at);
        let bytes = Self::encode(&key, &record)?;
        self.backend
            .put(&key, &bytes)
            .await
            .map_err(Self::map_storage_error)?;
        Ok(record)
    }
}
