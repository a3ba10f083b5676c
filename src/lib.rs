//! Scheduled reminder delivery for a personal to-do application.
//!
//! This crate implements the reminder pipeline: a periodic query for due,
//! incomplete tasks, a fan-out lookup of each owner's push-delivery token,
//! and an at-least-once push-notification dispatch.
//!
//! # Overview
//!
//! Two components communicate only through the persisted owner → token
//! mapping:
//!
//! - the [`TokenRegistrar`] upserts the current delivery token for an owner
//!   whenever the client obtains or refreshes one;
//! - the [`ReminderDispatcher`] runs on an interval, selects tasks with
//!   `completed == false && remindAt <= now`, resolves tokens and sends one
//!   "Task Reminder" notification per task.
//!
//! # Module Organization
//!
//! - [`domain`] - Validated `Task` and `DeliveryToken` documents
//! - [`store`] - Store traits, the document store, and storage backends
//! - [`transport`] - Push transports (FCM HTTP v1, dry-run logger)
//! - [`dispatcher`] - One reminder pass and its report
//! - [`scheduler`] - Interval driver for the dispatcher
//! - [`registrar`] - Token registration
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Store, registration and dispatch errors
//! - [`constants`] - Collection names, notification text, defaults

pub mod clock;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod registrar;
pub mod scheduler;
pub mod store;
pub mod transport;

// Re-exports for ergonomic access
pub use config::{ConfigError, ReminderConfig};
pub use dispatcher::{DispatchConfig, DispatchOutcome, DispatchReport, ReminderDispatcher};
pub use domain::{DeliveryToken, Task};
pub use error::{DispatchError, RegistrationError, StoreError};
pub use registrar::TokenRegistrar;
pub use scheduler::ReminderScheduler;
pub use store::{DueQuery, TaskSource, TokenStore};
pub use transport::{Notification, NotificationTransport, SendError};
