//! Push-notification transports.
//!
//! The dispatcher talks to a [`NotificationTransport`]; concrete transports
//! are [`FcmTransport`](fcm::FcmTransport) (Firebase Cloud Messaging HTTP
//! v1) and [`LogTransport`] (dry runs).

pub mod fcm;

use async_trait::async_trait;
use serde::Serialize;

use crate::constants::{reminder_body, REMINDER_TITLE};

/// A single push notification addressed to one device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Device token issued by the transport.
    pub token: String,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

impl Notification {
    /// Builds the reminder notification for a task title.
    ///
    /// # Examples
    ///
    /// ```
    /// use task_reminders::transport::Notification;
    ///
    /// let n = Notification::reminder("tok1", "buy milk");
    /// assert_eq!(n.title, "Task Reminder");
    /// assert_eq!(n.body, "Don't forget to: buy milk");
    /// ```
    pub fn reminder(token: impl Into<String>, task_title: &str) -> Self {
        Self {
            token: token.into(),
            title: REMINDER_TITLE.to_string(),
            body: reminder_body(task_title),
        }
    }
}

/// Errors reported by a transport for a single send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The token is no longer registered with the push service.
    #[error("device token is unregistered")]
    Unregistered,

    /// The push service rejected the request (4xx other than 404/429).
    #[error("rejected by push service ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The push service is throttling or failing (429/5xx).
    #[error("push service unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// The request did not reach the push service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The send did not finish within the configured deadline.
    #[error("send timed out after {0} ms")]
    Timeout(u64),
}

/// Delivers notifications to devices.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Sends one notification.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] describing why the push service did not
    /// accept the notification.
    async fn send(&self, notification: &Notification) -> Result<(), SendError>;
}

/// Transport that only logs; used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            "dry run: notification not sent"
        );
        Ok(())
    }
}
