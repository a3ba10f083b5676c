//! Task document -- the validated shape of a stored to-do item.
//!
//! Only the fields the reminder pipeline reads are modelled. Unknown fields
//! written by the client application (priority, category, notes) are
//! ignored on read; the store never rewrites a task from this struct when
//! marking it reminded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::timestamp;
use crate::error::StoreError;

/// A to-do item as seen by the reminder pipeline.
///
/// Documents written by the web client use `userId` for the owner; `ownerId`
/// is accepted as an alias.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use task_reminders::domain::Task;
///
/// let now = Utc::now();
/// let task = Task::new("u1", "water plants").with_remind_at(now - Duration::seconds(1));
/// assert!(task.is_due(now));
/// assert!(!task.clone().completed_now().is_due(now));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Document id. Filled from the storage key when absent in the body.
    #[serde(default)]
    pub id: String,

    /// Identity of the owning user.
    #[serde(rename = "userId", alias = "ownerId")]
    pub owner_id: String,

    /// Free-form title, embedded in the reminder body.
    pub title: String,

    /// Whether the user has finished the task.
    #[serde(default)]
    pub completed: bool,

    /// When the user wants to be reminded.
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub remind_at: Option<DateTime<Utc>>,

    /// When a reminder was last delivered. Only written in single-reminder
    /// mode.
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reminded_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates an incomplete task with a generated `UUIDv4` id and no
    /// reminder.
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title: title.into(),
            completed: false,
            remind_at: None,
            reminded_at: None,
        }
    }

    /// Sets the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the reminder time.
    pub fn with_remind_at(mut self, at: DateTime<Utc>) -> Self {
        self.remind_at = Some(at);
        self
    }

    /// Marks the task completed.
    pub fn completed_now(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Returns `true` iff the task is unfinished and its reminder time has
    /// been reached.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.remind_at.is_some_and(|at| at <= now)
    }

    /// Returns `true` if no reminder has been delivered for the current
    /// `remind_at`. Moving `remind_at` past `reminded_at` re-arms the task.
    pub fn awaiting_reminder(&self) -> bool {
        match (self.remind_at, self.reminded_at) {
            (_, None) => true,
            (Some(at), Some(reminded)) => reminded < at,
            (None, Some(_)) => false,
        }
    }

    /// Decodes and validates a stored task document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] if the bytes are not a task
    /// document, the owner is empty, or the title is empty.
    pub fn from_document(key: &str, doc_id: &str, data: &[u8]) -> Result<Self, StoreError> {
        let mut task: Task = serde_json::from_slice(data).map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if task.id.is_empty() {
            task.id = doc_id.to_string();
        }
        task.validate().map_err(|reason| StoreError::Malformed {
            key: key.to_string(),
            reason,
        })?;
        Ok(task)
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("empty task id".to_string());
        }
        if self.owner_id.trim().is_empty() {
            return Err("empty owner id".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("empty title".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn due_requires_incomplete_and_past_reminder() {
        let now = Utc::now();
        let task = Task::new("u1", "pay rent");
        assert!(!task.is_due(now), "no remind_at");

        let task = task.with_remind_at(now);
        assert!(task.is_due(now), "remind_at == now is due");

        let later = Task::new("u1", "pay rent").with_remind_at(now + Duration::seconds(60));
        assert!(!later.is_due(now));

        let done = Task::new("u1", "pay rent")
            .with_remind_at(now - Duration::hours(1))
            .completed_now();
        assert!(!done.is_due(now));
    }

    #[test]
    fn awaiting_reminder_rearms_when_remind_at_moves() {
        let now = Utc::now();
        let mut task = Task::new("u1", "stretch").with_remind_at(now - Duration::minutes(5));
        assert!(task.awaiting_reminder());

        task.reminded_at = Some(now);
        assert!(!task.awaiting_reminder());

        task.remind_at = Some(now + Duration::minutes(1));
        assert!(task.awaiting_reminder());
    }

    #[test]
    fn decodes_client_document_shape() {
        let doc = json!({
            "userId": "u1",
            "title": "buy milk",
            "completed": false,
            "remindAt": 1_740_817_800_000_i64,
            "priority": "high"
        });
        let bytes = serde_json::to_vec(&doc).unwrap();
        let task = Task::from_document("tasks/t-1", "t-1", &bytes).unwrap();
        assert_eq!(task.id, "t-1");
        assert_eq!(task.owner_id, "u1");
        assert_eq!(task.remind_at.map(|at| at.timestamp()), Some(1_740_817_800));
    }

    #[test]
    fn accepts_owner_id_alias() {
        let bytes = serde_json::to_vec(&json!({
            "id": "t-2",
            "ownerId": "u2",
            "title": "call mom"
        }))
        .unwrap();
        let task = Task::from_document("tasks/t-2", "t-2", &bytes).unwrap();
        assert_eq!(task.owner_id, "u2");
        assert!(!task.completed);
        assert!(task.remind_at.is_none());
    }

    #[test]
    fn rejects_missing_owner_and_empty_title() {
        let bytes = serde_json::to_vec(&json!({ "title": "orphan" })).unwrap();
        let err = Task::from_document("tasks/t-3", "t-3", &bytes).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));

        let bytes = serde_json::to_vec(&json!({ "userId": "u1", "title": "  " })).unwrap();
        let err = Task::from_document("tasks/t-4", "t-4", &bytes).unwrap_err();
        assert!(err.to_string().contains("empty title"));
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        let bytes = serde_json::to_vec(&json!({
            "userId": "u1",
            "title": "x",
            "completed": "nope"
        }))
        .unwrap();
        assert!(Task::from_document("tasks/t-5", "t-5", &bytes).is_err());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let task = Task::new("u1", "read").with_id("t-6");
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["userId"], json!("u1"));
        assert!(value.get("remindAt").is_none());
        assert!(value.get("remindedAt").is_none());
    }
}
