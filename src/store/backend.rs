//! Low-level key-value storage backend trait and supporting types.
//!
//! The [`StorageBackend`] trait defines the contract that every document
//! backend implements. It exposes 5 KV operations: [`get`](StorageBackend::get),
//! [`put`](StorageBackend::put), [`put_if_version`](StorageBackend::put_if_version),
//! [`delete`](StorageBackend::delete), and
//! [`list_by_prefix`](StorageBackend::list_by_prefix).
//!
//! Domain logic (schema validation, due filtering, paging, reminder
//! marking) does **not** belong here. Backends are dumb KV stores; domain
//! logic lives in [`DocumentStore`](crate::store::document::DocumentStore).
//!
//! # Key Structure
//!
//! Keys are composite strings in the format `{collection}/{doc_id}`, e.g.
//! `tasks/3f1c...` or `fcmTokens/user-42`. Prefix queries use
//! `{collection}/` to scan one collection.
//!
//! # Versioning
//!
//! Each stored record carries a monotonic `u64` version starting at 1,
//! incremented on every successful write. [`put_if_version`](StorageBackend::put_if_version)
//! provides compare-and-swap semantics for optimistic concurrency.

use std::fmt;

use async_trait::async_trait;

/// A stored document paired with its monotonic version number.
///
/// # Examples
///
/// ```
/// use task_reminders::store::backend::VersionedRecord;
///
/// let record = VersionedRecord {
///     data: b"{}".to_vec(),
///     version: 1,
/// };
/// assert_eq!(record.version, 1);
/// ```
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    /// The serialized document bytes (JSON).
    pub data: Vec<u8>,

    /// Monotonic version number. Starts at 1, increments on each write.
    pub version: u64,
}

/// Errors that can occur during raw storage operations.
///
/// `DocumentStore` maps these to [`StoreError`](crate::error::StoreError)
/// before surfacing them to the pipeline.
#[derive(Debug)]
pub enum StorageError {
    /// The requested key was not found in storage.
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// A [`put_if_version`](StorageBackend::put_if_version) call failed
    /// because the stored version does not match.
    VersionConflict {
        /// The key where the conflict occurred.
        key: String,
        /// The version the caller expected.
        expected: u64,
        /// The actual version found in storage.
        actual: u64,
    },

    /// An I/O or backend-specific error (network failure, timeout,
    /// file system error).
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Wraps an underlying error as [`StorageError::Backend`].
    pub fn backend<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "key not found: {key}"),
            Self::VersionConflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on key {key}: expected {expected}, found {actual}"
            ),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Key-value storage backend for documents.
///
/// Implementations must be `Send + Sync`; the dispatcher reads from the
/// backend concurrently while the registrar writes to it.
///
/// Backends must **never** interpret the documents they store.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a record by key.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the key.
    /// - [`StorageError::Backend`] on I/O failures.
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError>;

    /// Stores a record unconditionally (create or overwrite) and returns
    /// the assigned version.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O failures.
    async fn put(&self, key: &str, data: &[u8]) -> Result<u64, StorageError>;

    /// Stores a record only if the current version matches
    /// `expected_version`. Returns the new version.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no record exists for the key.
    /// - [`StorageError::VersionConflict`] on version mismatch.
    /// - [`StorageError::Backend`] on I/O failures.
    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError>;

    /// Deletes a record. Returns `true` if the key existed.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O failures.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Lists all records whose key starts with `prefix`, sorted by key.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Backend`] on I/O failures.
    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError>;
}

/// Constructs a storage key from a collection and document id.
///
/// # Examples
///
/// ```
/// use task_reminders::store::backend::make_key;
///
/// assert_eq!(make_key("tasks", "t-1"), "tasks/t-1");
/// ```
pub fn make_key(collection: &str, doc_id: &str) -> String {
    format!("{collection}/{doc_id}")
}

/// Parses a storage key into `(collection, doc_id)`, splitting on the
/// first slash.
///
/// # Examples
///
/// ```
/// use task_reminders::store::backend::parse_key;
///
/// assert_eq!(parse_key("fcmTokens/u1"), Some(("fcmTokens", "u1")));
/// assert_eq!(parse_key("no-slash"), None);
/// ```
pub fn parse_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
}

/// Constructs the scan prefix for a collection.
pub fn make_prefix(collection: &str) -> String {
    format!("{collection}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display_not_found() {
        let err = StorageError::NotFound {
            key: "tasks/t-1".to_string(),
        };
        assert_eq!(err.to_string(), "key not found: tasks/t-1");
    }

    #[test]
    fn storage_error_display_version_conflict() {
        let err = StorageError::VersionConflict {
            key: "tasks/t-2".to_string(),
            expected: 3,
            actual: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("tasks/t-2"));
        assert!(msg.contains("expected 3"));
        assert!(msg.contains("found 5"));
    }

    #[test]
    fn storage_error_backend_exposes_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = StorageError::backend("read failed", inner);
        assert_eq!(err.to_string(), "backend error: read failed");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("timed out"));
    }

    #[test]
    fn not_found_has_no_source() {
        let err = StorageError::NotFound {
            key: "k".to_string(),
        };
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn parse_key_splits_on_first_slash() {
        assert_eq!(parse_key("tasks/a/b"), Some(("tasks", "a/b")));
        assert_eq!(parse_key("tasks/"), Some(("tasks", "")));
    }

    #[test]
    fn prefix_matches_keys_of_the_collection() {
        let prefix = make_prefix("tasks");
        assert!(make_key("tasks", "t-1").starts_with(&prefix));
        assert!(!make_key("fcmTokens", "t-1").starts_with(&prefix));
    }
}
