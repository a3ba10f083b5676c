//! Reminder Dispatcher: one scheduled pass over due tasks.
//!
//! A run selects every task with `completed == false` and
//! `remind_at <= now` (paging until the source is exhausted), resolves each
//! owner's delivery token once per run, and sends one notification per
//! task on a bounded-concurrency pool.
//!
//! # Failure Isolation
//!
//! Only the due-task query can fail a run ([`DispatchError::Query`]).
//! Missing tokens, token lookup failures, send failures, and send timeouts
//! become per-task [`DispatchOutcome`]s and are folded into the
//! [`DispatchReport`].
//!
//! # Delivery Semantics
//!
//! By default tasks are never marked, so a due task is re-notified on every
//! run until it is completed or its `remind_at` moves (at-least-once,
//! repeating). With [`DispatchConfig::single_reminder`] a successful send
//! stamps `reminded_at` and the task is skipped until re-armed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, OnceCell};

use crate::constants::{DEFAULT_CONCURRENCY_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_SEND_TIMEOUT_MS};
use crate::domain::Task;
use crate::error::DispatchError;
use crate::store::{DueQuery, TaskSource, TokenStore};
use crate::transport::{Notification, NotificationTransport, SendError};

/// Tunables for a dispatcher.
///
/// # Defaults
///
/// | Setting             | Default | Description                                  |
/// |---------------------|---------|----------------------------------------------|
/// | `concurrency_limit` | 8       | In-flight token lookups + sends per run      |
/// | `page_size`         | 500     | Due tasks requested per query page           |
/// | `send_timeout`      | 10 s    | Deadline for a single send                   |
/// | `single_reminder`   | false   | Stamp `reminded_at` after a successful send  |
/// | `serialize_runs`    | true    | Reject a run while another is in flight      |
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum number of tasks processed concurrently.
    pub concurrency_limit: usize,

    /// Page size requested from the task source.
    pub page_size: usize,

    /// Deadline for one transport send.
    pub send_timeout: Duration,

    /// Remind once per `remind_at` instead of on every run.
    pub single_reminder: bool,

    /// Refuse overlapping runs with [`DispatchError::RunInProgress`].
    pub serialize_runs: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            single_reminder: false,
            serialize_runs: true,
        }
    }
}

/// Result of handling one due task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The transport accepted the notification.
    Sent,
    /// The owner has no registered delivery token.
    NoToken,
    /// The token lookup itself failed.
    LookupFailed(String),
    /// The transport rejected the notification or timed out.
    SendFailed(SendError),
}

/// One `(task, outcome)` pair from a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAttempt {
    /// The task's id.
    pub task_id: String,
    /// The task's owner.
    pub owner_id: String,
    /// What happened.
    pub outcome: DispatchOutcome,
    /// Whether `reminded_at` was stamped (single-reminder mode only).
    pub marked: bool,
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Evaluation instant of the run.
    pub now: Option<DateTime<Utc>>,
    /// Due tasks selected.
    pub scanned: usize,
    /// Notifications accepted by the transport.
    pub sent: usize,
    /// Tasks whose owner had no token.
    pub no_token: usize,
    /// Sends rejected or timed out.
    pub send_failed: usize,
    /// Token lookups that failed.
    pub lookup_failed: usize,
    /// Malformed task documents skipped.
    pub malformed: usize,
    /// Tasks stamped with `reminded_at`.
    pub marked: usize,
    /// Query pages fetched.
    pub pages: usize,
    /// Per-task attempts, in completion order.
    pub attempts: Vec<DispatchAttempt>,
}

impl DispatchReport {
    fn record(&mut self, attempt: DispatchAttempt) {
        self.scanned += 1;
        match &attempt.outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::NoToken => self.no_token += 1,
            DispatchOutcome::LookupFailed(_) => self.lookup_failed += 1,
            DispatchOutcome::SendFailed(_) => self.send_failed += 1,
        }
        if attempt.marked {
            self.marked += 1;
        }
        self.attempts.push(attempt);
    }

    /// Returns the attempts for `task_id`.
    pub fn attempts_for<'a>(
        &'a self,
        task_id: &'a str,
    ) -> impl Iterator<Item = &'a DispatchAttempt> + 'a {
        self.attempts.iter().filter(move |a| a.task_id == task_id)
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} sent={} no_token={} send_failed={} lookup_failed={} malformed={}",
            self.scanned,
            self.sent,
            self.no_token,
            self.send_failed,
            self.lookup_failed,
            self.malformed
        )?;
        if self.marked > 0 {
            write!(f, " marked={}", self.marked)?;
        }
        Ok(())
    }
}

type TokenResolution = Result<Option<String>, String>;

/// Per-run owner → token cache. Each owner is looked up at most once.
#[derive(Default)]
struct TokenCache {
    entries: DashMap<String, Arc<OnceCell<TokenResolution>>>,
}

/// Runs reminder passes against injected stores and transport.
pub struct ReminderDispatcher {
    tasks: Arc<dyn TaskSource>,
    tokens: Arc<dyn TokenStore>,
    transport: Arc<dyn NotificationTransport>,
    config: DispatchConfig,
    run_lock: Mutex<()>,
}

impl ReminderDispatcher {
    /// Creates a dispatcher with default configuration.
    pub fn new(
        tasks: Arc<dyn TaskSource>,
        tokens: Arc<dyn TokenStore>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            tasks,
            tokens,
            transport,
            config: DispatchConfig::default(),
            run_lock: Mutex::new(()),
        }
    }

    /// Sets the dispatch configuration.
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Executes one reminder pass evaluated at `now`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Query`] if any page of the due-task query fails.
    ///   No report is produced for the run.
    /// - [`DispatchError::RunInProgress`] if runs are serialized and another
    ///   run holds the guard.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<DispatchReport, DispatchError> {
        let _guard = if self.config.serialize_runs {
            Some(
                self.run_lock
                    .try_lock()
                    .map_err(|_| DispatchError::RunInProgress)?,
            )
        } else {
            None
        };

        tracing::info!(now = %now, "checking for tasks to remind");

        let query = DueQuery::at(now).skip_reminded(self.config.single_reminder);
        let limit = self.config.concurrency_limit.max(1);
        let page_size = self.config.page_size.max(1);
        let cache = TokenCache::default();
        let mut report = DispatchReport {
            now: Some(now),
            ..DispatchReport::default()
        };
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .tasks
                .query_due(&query, cursor.as_deref(), page_size)
                .await
                .map_err(|err| {
                    tracing::error!(
                        error = %err,
                        transient = err.is_transient(),
                        "due-task query failed; skipping run"
                    );
                    DispatchError::Query(err)
                })?;

            report.pages += 1;
            report.malformed += page.malformed.len();
            tracing::info!(
                page = report.pages,
                found = page.tasks.len(),
                "found tasks to remind"
            );

            let attempts: Vec<DispatchAttempt> = stream::iter(page.tasks)
                .map(|task| self.dispatch_one(task, now, &cache))
                .buffer_unordered(limit)
                .collect()
                .await;
            for attempt in attempts {
                report.record(attempt);
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(
            scanned = report.scanned,
            sent = report.sent,
            no_token = report.no_token,
            send_failed = report.send_failed,
            lookup_failed = report.lookup_failed,
            malformed = report.malformed,
            marked = report.marked,
            "finished sending reminders"
        );
        Ok(report)
    }

    async fn resolve_token(&self, owner_id: &str, cache: &TokenCache) -> TokenResolution {
        let cell = cache
            .entries
            .entry(owner_id.to_string())
            .or_default()
            .clone();
        cell.get_or_init(|| async {
            self.tokens
                .get_token(owner_id)
                .await
                .map(|record| record.map(|r| r.token))
                .map_err(|err| err.to_string())
        })
        .await
        .clone()
    }

    async fn send_with_deadline(&self, notification: &Notification) -> Result<(), SendError> {
        match tokio::time::timeout(self.config.send_timeout, self.transport.send(notification)).await
        {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(
                u64::try_from(self.config.send_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    async fn dispatch_one(
        &self,
        task: Task,
        now: DateTime<Utc>,
        cache: &TokenCache,
    ) -> DispatchAttempt {
        let outcome = match self.resolve_token(&task.owner_id, cache).await {
            Err(reason) => {
                tracing::warn!(
                    task_id = %task.id,
                    owner_id = %task.owner_id,
                    error = %reason,
                    "delivery token lookup failed"
                );
                DispatchOutcome::LookupFailed(reason)
            },
            Ok(None) => {
                tracing::info!(owner_id = %task.owner_id, "no delivery token for user");
                DispatchOutcome::NoToken
            },
            Ok(Some(token)) => {
                let notification = Notification::reminder(token, &task.title);
                match self.send_with_deadline(&notification).await {
                    Ok(()) => {
                        tracing::info!(
                            task_id = %task.id,
                            owner_id = %task.owner_id,
                            "sent reminder"
                        );
                        DispatchOutcome::Sent
                    },
                    Err(err) => {
                        tracing::warn!(
                            task_id = %task.id,
                            owner_id = %task.owner_id,
                            error = %err,
                            "failed to send reminder"
                        );
                        DispatchOutcome::SendFailed(err)
                    },
                }
            },
        };

        let mut marked = false;
        if self.config.single_reminder && outcome == DispatchOutcome::Sent {
            match self.tasks.mark_reminded(&task.id, now).await {
                Ok(()) => marked = true,
                Err(err) => tracing::warn!(
                    task_id = %task.id,
                    error = %err,
                    "could not mark task as reminded; it may be reminded again"
                ),
            }
        }

        DispatchAttempt {
            task_id: task.id,
            owner_id: task.owner_id,
            outcome,
            marked,
        }
    }
}
