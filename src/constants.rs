//! Constants for reminder payloads, store key prefixes, and defaults.

/// Title carried by every reminder notification.
pub const REMINDER_TITLE: &str = "Task Reminder";

/// Prefix of the reminder body; the task title is appended verbatim.
pub const REMINDER_BODY_PREFIX: &str = "Don't forget to: ";

/// Collection holding task documents.
pub const TASKS_COLLECTION: &str = "tasks";

/// Collection holding one delivery token document per owner.
pub const TOKENS_COLLECTION: &str = "fcmTokens";

/// Default dispatch period in seconds ("every 2 minutes").
pub const DEFAULT_INTERVAL_SECS: u64 = 120;

/// Default number of in-flight token lookups and sends per run.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 8;

/// Default page size for the due-task query.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Default per-send timeout in milliseconds.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;

/// Builds the notification body for a task title.
///
/// # Examples
///
/// ```
/// use task_reminders::constants::reminder_body;
///
/// assert_eq!(reminder_body("water plants"), "Don't forget to: water plants");
/// ```
pub fn reminder_body(task_title: &str) -> String {
    format!("{REMINDER_BODY_PREFIX}{task_title}")
}
