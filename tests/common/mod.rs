//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use task_reminders::domain::{DeliveryToken, Task};
use task_reminders::error::StoreError;
use task_reminders::store::memory::InMemoryStore;
use task_reminders::store::{DuePage, DueQuery, TaskSource, TokenStore};
use task_reminders::transport::{Notification, NotificationTransport, SendError};

/// Fixed evaluation instant so test runs are reproducible.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
}

/// Stores a due task (`remind_at = now - 1s`).
pub async fn seed_due(store: &InMemoryStore, id: &str, owner: &str, title: &str) {
    store
        .put_task(
            &Task::new(owner, title)
                .with_id(id)
                .with_remind_at(fixed_now() - Duration::seconds(1)),
        )
        .await
        .unwrap();
}

/// Transport that records every notification and fails for chosen tokens.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn fail_for(&self, token: &str) {
        self.failing.lock().insert(token.to_string());
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        self.sent.lock().push(notification.clone());
        if self.failing.lock().contains(&notification.token) {
            return Err(SendError::Unavailable {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Task source whose query always fails.
pub struct FailingTaskSource;

#[async_trait]
impl TaskSource for FailingTaskSource {
    async fn query_due(
        &self,
        _query: &DueQuery,
        _cursor: Option<&str>,
        _limit: usize,
    ) -> Result<DuePage, StoreError> {
        Err(StoreError::Backend("connection reset".to_string()))
    }

    async fn mark_reminded(&self, _task_id: &str, _at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Task source that serves the first page and then fails.
pub struct FlakyAfterFirstPage {
    pub inner: Arc<InMemoryStore>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TaskSource for FlakyAfterFirstPage {
    async fn query_due(
        &self,
        query: &DueQuery,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DuePage, StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(StoreError::Backend("deadline exceeded".to_string()));
        }
        self.inner.query_due(query, cursor, limit).await
    }

    async fn mark_reminded(&self, task_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.mark_reminded(task_id, at).await
    }
}

/// Token store whose lookups fail for chosen owners.
pub struct PartlyBrokenTokens {
    pub inner: Arc<InMemoryStore>,
    pub broken_owners: HashSet<String>,
}

#[async_trait]
impl TokenStore for PartlyBrokenTokens {
    async fn get_token(&self, owner_id: &str) -> Result<Option<DeliveryToken>, StoreError> {
        if self.broken_owners.contains(owner_id) {
            return Err(StoreError::Backend("permission denied".to_string()));
        }
        self.inner.get_token(owner_id).await
    }

    async fn put_token(
        &self,
        owner_id: &str,
        token: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<DeliveryToken, StoreError> {
        self.inner.put_token(owner_id, token, updated_at).await
    }
}
