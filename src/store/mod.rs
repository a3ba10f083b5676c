//! Store traits, the document store, and storage backends.
//!
//! # Architecture
//!
//! The storage system has three layers:
//!
//! 1. **[`TaskSource`] / [`TokenStore`]** -- the narrow interfaces the
//!    dispatcher and registrar consume, used as `Arc<dyn TaskSource>` and
//!    `Arc<dyn TokenStore>`.
//!
//! 2. **[`DocumentStore<B>`](document::DocumentStore)** -- all domain logic
//!    (schema validation and quarantine, due filtering, cursor paging,
//!    CAS-based reminder marking). Implements both traits.
//!
//! 3. **[`StorageBackend`]** -- dumb versioned KV trait that backends
//!    implement. No domain logic.
//!
//! # Backends
//!
//! - [`InMemoryBackend`](memory::InMemoryBackend) -- `DashMap`-based, for
//!   tests and single-process deployments.
//! - [`FsBackend`](fs::FsBackend) -- one JSON file per document under a
//!   root directory.

pub mod backend;
pub mod document;
pub mod fs;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use backend::{StorageBackend, StorageError, VersionedRecord};
pub use document::DocumentStore;

use crate::domain::{DeliveryToken, Task};
use crate::error::StoreError;

/// Filter for the due-task query.
///
/// Selects tasks with `completed == false` and `remind_at <= now`. With
/// `skip_reminded`, tasks already reminded for their current `remind_at`
/// are excluded as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueQuery {
    /// Evaluation instant; `remind_at <= now` matches.
    pub now: DateTime<Utc>,

    /// Exclude tasks whose `reminded_at >= remind_at`.
    pub skip_reminded: bool,
}

impl DueQuery {
    /// Query for everything due at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            skip_reminded: false,
        }
    }

    /// Sets whether already-reminded tasks are excluded.
    pub fn skip_reminded(mut self, skip: bool) -> Self {
        self.skip_reminded = skip;
        self
    }

    /// Returns `true` if `task` satisfies this filter.
    pub fn matches(&self, task: &Task) -> bool {
        task.is_due(self.now) && (!self.skip_reminded || task.awaiting_reminder())
    }
}

/// One page of due tasks.
///
/// # Examples
///
/// ```
/// use task_reminders::store::DuePage;
///
/// let page = DuePage::default();
/// assert!(page.tasks.is_empty());
/// assert!(page.next_cursor.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DuePage {
    /// Due tasks in this page.
    pub tasks: Vec<Task>,

    /// Keys of records in this page's range that failed validation.
    pub malformed: Vec<String>,

    /// Cursor for the next page. `None` when the scan is exhausted.
    pub next_cursor: Option<String>,
}

/// Read side of the task collection, as consumed by the dispatcher.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Returns up to `limit` tasks matching `query`, starting after
    /// `cursor`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Backend`] if the query could not be executed.
    async fn query_due(
        &self,
        query: &DueQuery,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DuePage, StoreError>;

    /// Records that a reminder for `task_id` was delivered at `at`.
    ///
    /// Only used in single-reminder mode.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the task was deleted meanwhile.
    /// - [`StoreError::Conflict`] if the task was modified concurrently.
    /// - [`StoreError::Backend`] on backend failures.
    async fn mark_reminded(&self, task_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Owner → delivery token mapping.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Looks up the token registered for `owner_id`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Malformed`] if the stored record is unusable.
    /// - [`StoreError::Backend`] on backend failures.
    async fn get_token(&self, owner_id: &str) -> Result<Option<DeliveryToken>, StoreError>;

    /// Upserts the token for `owner_id`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Backend`] on backend failures.
    async fn put_token(
        &self,
        owner_id: &str,
        token: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<DeliveryToken, StoreError>;
}
