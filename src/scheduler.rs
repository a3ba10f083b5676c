//! Periodic trigger for [`ReminderDispatcher::run_once`].
//!
//! Ticks on a fixed interval (default every 2 minutes). A missed tick is
//! delayed rather than bursted, so a slow run never causes back-to-back
//! catch-up runs. Run errors are logged; the loop keeps going until its
//! [`CancellationToken`] is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::dispatcher::ReminderDispatcher;
use crate::error::DispatchError;

/// Counters accumulated over a scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Runs that produced a report.
    pub completed_runs: u64,
    /// Runs that failed on the due-task query.
    pub failed_runs: u64,
    /// Ticks skipped because a run was still in flight.
    pub skipped_runs: u64,
}

/// Drives a dispatcher on an interval.
pub struct ReminderScheduler {
    dispatcher: Arc<ReminderDispatcher>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ReminderScheduler {
    /// Creates a scheduler with the system clock.
    pub fn new(dispatcher: Arc<ReminderDispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            clock: Arc::new(SystemClock),
            interval,
        }
    }

    /// Replaces the clock that supplies each run's `now`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs until `cancel` fires. The first tick fires immediately.
    pub async fn run(&self, cancel: CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "reminder scheduler started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = tick.tick() => {
                    // A started run always finishes; cancellation is observed between ticks.
                    match self.dispatcher.run_once(self.clock.now()).await {
                        Ok(report) => {
                            stats.completed_runs += 1;
                            tracing::debug!(%report, "run complete");
                        },
                        Err(DispatchError::RunInProgress) => {
                            stats.skipped_runs += 1;
                            tracing::warn!("previous run still in progress; skipping tick");
                        },
                        Err(DispatchError::Query(err)) if err.is_transient() => {
                            stats.failed_runs += 1;
                            tracing::warn!(error = %err, "reminder run failed; retrying next tick");
                        },
                        Err(err) => {
                            stats.failed_runs += 1;
                            tracing::error!(error = %err, "reminder run failed");
                        },
                    }
                }
            }
        }

        tracing::info!(
            completed = stats.completed_runs,
            failed = stats.failed_runs,
            skipped = stats.skipped_runs,
            "reminder scheduler stopped"
        );
        stats
    }
}
