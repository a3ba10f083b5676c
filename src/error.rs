//! Error types for reminder pipeline operations.
//!
//! - [`StoreError`] is the store-layer error surfaced by
//!   [`TaskSource`](crate::store::TaskSource) and
//!   [`TokenStore`](crate::store::TokenStore).
//! - [`RegistrationError`] is returned by the
//!   [`TokenRegistrar`](crate::registrar::TokenRegistrar).
//! - [`DispatchError`] is the only error that escapes
//!   [`ReminderDispatcher::run_once`](crate::dispatcher::ReminderDispatcher::run_once).
//!
//! Per-task failures (missing token, send failure) are outcomes, not
//! errors; see [`DispatchOutcome`](crate::dispatcher::DispatchOutcome).

use std::fmt;

/// Errors raised by document stores.
///
/// # Examples
///
/// ```
/// use task_reminders::StoreError;
///
/// let err = StoreError::Malformed {
///     key: "tasks/t-9".to_string(),
///     reason: "missing field `userId`".to_string(),
/// };
/// assert!(err.to_string().contains("tasks/t-9"));
/// assert!(!err.is_transient());
/// ```
#[derive(Debug)]
pub enum StoreError {
    /// No document exists under the given key.
    NotFound {
        /// The missing key.
        key: String,
    },

    /// A compare-and-swap write lost against a concurrent writer.
    Conflict {
        /// The contended key.
        key: String,
    },

    /// A stored document failed schema validation.
    Malformed {
        /// The offending key.
        key: String,
        /// Why validation failed.
        reason: String,
    },

    /// The backend failed (I/O, network, permissions).
    Backend(String),
}

impl StoreError {
    /// Returns `true` for failures that may succeed on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Backend(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "document not found: {key}"),
            Self::Conflict { key } => write!(f, "concurrent modification of {key}"),
            Self::Malformed { key, reason } => {
                write!(f, "malformed document {key}: {reason}")
            },
            Self::Backend(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors returned when recording a delivery token.
#[derive(Debug)]
pub enum RegistrationError {
    /// The owner id or token was empty.
    InvalidInput {
        /// Name of the rejected argument.
        field: &'static str,
    },

    /// The token store rejected the write.
    Store(StoreError),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { field } => write!(f, "{field} must not be empty"),
            Self::Store(err) => write!(f, "failed to persist delivery token: {err}"),
        }
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::InvalidInput { .. } => None,
        }
    }
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Run-level dispatch failures.
///
/// The scheduler treats any `DispatchError` as "this tick failed"; the next
/// tick is the retry.
#[derive(Debug)]
pub enum DispatchError {
    /// The due-task query failed. No report is produced for the run.
    Query(StoreError),

    /// Another run is still in flight and runs are serialized.
    RunInProgress,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(err) => write!(f, "due-task query failed: {err}"),
            Self::RunInProgress => write!(f, "a dispatch run is already in progress"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            Self::RunInProgress => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_messages() {
        let err = StoreError::NotFound {
            key: "tasks/abc".to_string(),
        };
        assert_eq!(err.to_string(), "document not found: tasks/abc");

        let err = StoreError::Backend("deadline exceeded".to_string());
        assert_eq!(err.to_string(), "store error: deadline exceeded");
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Backend("x".to_string()).is_transient());
        assert!(StoreError::Conflict {
            key: "k".to_string()
        }
        .is_transient());
        assert!(!StoreError::NotFound {
            key: "k".to_string()
        }
        .is_transient());
    }

    #[test]
    fn registration_error_wraps_store_error() {
        let err: RegistrationError = StoreError::Backend("permission denied".to_string()).into();
        assert!(err.to_string().contains("permission denied"));
        assert!(std::error::Error::source(&err).is_some());

        let err = RegistrationError::InvalidInput { field: "token" };
        assert_eq!(err.to_string(), "token must not be empty");
    }

    #[test]
    fn dispatch_error_display() {
        let err = DispatchError::Query(StoreError::Backend("unavailable".to_string()));
        assert_eq!(
            err.to_string(),
            "due-task query failed: store error: unavailable"
        );
        assert_eq!(
            DispatchError::RunInProgress.to_string(),
            "a dispatch run is already in progress"
        );
    }
}
