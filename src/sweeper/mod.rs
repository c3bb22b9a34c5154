//! # Expiry Sweeper
//!
//! Periodic removal of accounts that never completed verification.
//! Deleting a user cascades to its codes and refresh tokens.

pub mod scheduler;

pub use scheduler::{parse_schedule, SweepReport, SweepScheduler};

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::auth::errors::{AuthError, AuthResult};
use crate::auth::user::UserStatus;
use crate::config::{SweeperConfig, MAX_RETENTION_HOURS};
use crate::db;

/// Deletes unverified users older than the retention window
#[derive(Clone)]
pub struct ExpirySweeper {
    pool: SqlitePool,
    retention: Duration,
}

impl ExpirySweeper {
    pub fn new(pool: SqlitePool, config: &SweeperConfig) -> AuthResult<Self> {
        let hours = config.unverified_retention_hours;
        let retention = Some(hours)
            .filter(|h| (1..=MAX_RETENTION_HOURS).contains(h))
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                AuthError::Config(format!("UNVERIFIED_RETENTION_HOURS: {} out of range", hours))
            })?;
        Ok(Self::with_retention(pool, retention))
    }

    pub fn with_retention(pool: SqlitePool, retention: Duration) -> Self {
        Self { pool, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Run one sweep against the current time
    pub async fn sweep_once(&self) -> AuthResult<u64> {
        self.sweep_at(Utc::now()).await
    }

    /// Delete every unverified user created strictly before
    /// `now - retention`, all in one transaction.
    ///
    /// Returns the number of users removed.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let cutoff = now.checked_sub_signed(self.retention).ok_or_else(|| {
            AuthError::Internal(format!("sweep cutoff before {} is out of range", now))
        })?;

        let mut tx = db::begin_write(&self.pool).await?;
        let result = sqlx::query("DELETE FROM users WHERE status = ? AND created_at < ?")
            .bind(UserStatus::Unverified)
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!(deleted, cutoff = %cutoff, "removed unverified users");
        } else {
            tracing::debug!(cutoff = %cutoff, "no unverified users to remove");
        }
        Ok(deleted)
    }
}
