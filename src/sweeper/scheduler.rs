//! Sweep scheduler.
//!
//! Drives an [`ExpirySweeper`] on a cron schedule until cancelled. A
//! failed sweep is logged and the loop waits for the next slot.

use chrono::{DateTime, Utc};
use croner::errors::CronError;
use croner::Cron;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ExpirySweeper;
use crate::auth::errors::{AuthError, AuthResult};
use crate::config::SweeperConfig;

/// Parse a 5-field cron expression (an optional leading seconds field is
/// accepted as well).
pub fn parse_schedule(expr: &str) -> Result<Cron, CronError> {
    Cron::new(expr).with_seconds_optional().parse()
}

/// Outcome of a scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sweeps attempted
    pub runs: u64,
    /// Sweeps that returned an error
    pub failures: u64,
    /// Users removed across all successful sweeps
    pub deleted: u64,
}

/// Tracks when the next sweep is due.
pub struct SweepScheduler {
    cron: Cron,
    schedule: String,
    enabled: bool,
    last_run: Option<DateTime<Utc>>,
}

impl SweepScheduler {
    /// Create a scheduler from config; fails on a bad cron expression.
    pub fn new(config: &SweeperConfig) -> AuthResult<Self> {
        let cron = parse_schedule(&config.schedule)
            .map_err(|e| AuthError::Config(format!("SWEEP_SCHEDULE: {}", e)))?;
        Ok(Self {
            cron,
            schedule: config.schedule.clone(),
            enabled: config.enabled,
            last_run: None,
        })
    }

    /// Check if sweeps are enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    /// Get the last sweep time.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// Record a finished sweep.
    pub fn mark_run_complete(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
    }

    /// First scheduled slot strictly after `after`.
    ///
    /// Returns None if sweeps are disabled.
    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.enabled {
            return None;
        }
        self.cron.find_next_occurrence(&after, false).ok()
    }

    /// Time from `now` until the next slot.
    pub fn time_until_next_run(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.next_run_after(now)
            .map(|next| (next - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }

    /// Sweep at every scheduled slot until `cancel` fires.
    pub async fn run(mut self, sweeper: ExpirySweeper, cancel: CancellationToken) -> SweepReport {
        let mut report = SweepReport::default();
        if !self.enabled {
            tracing::info!("unverified-user sweep disabled");
            return report;
        }
        tracing::info!(schedule = %self.schedule, retention = %sweeper.retention(), "sweep scheduler started");

        loop {
            let Some(wait) = self.time_until_next_run(Utc::now()) else {
                tracing::warn!(schedule = %self.schedule, "schedule has no upcoming run");
                break;
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            report.runs += 1;
            match sweeper.sweep_once().await {
                Ok(deleted) => report.deleted += deleted,
                Err(e) => {
                    report.failures += 1;
                    tracing::error!(error = %e, "unverified-user sweep failed");
                }
            }
            self.mark_run_complete(Utc::now());
        }

        tracing::info!(runs = report.runs, failures = report.failures, "sweep scheduler stopped");
        report
    }

    pub fn spawn(self, sweeper: ExpirySweeper, cancel: CancellationToken) -> JoinHandle<SweepReport> {
        tokio::spawn(self.run(sweeper, cancel))
    }
}
