//! # Auth Service
//!
//! Wires config, store, token codec, mail queue and sweeper into a running
//! [`SessionManager`] and owns the background tasks behind it.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::crypto::CredentialHasher;
use crate::auth::email::{email_queue, transport_from_config, DEFAULT_QUEUE_CAPACITY};
use crate::auth::errors::AuthResult;
use crate::auth::jwt::JwtManager;
use crate::auth::session::SessionManager;
use crate::config::AppConfig;
use crate::db;
use crate::sweeper::{ExpirySweeper, SweepScheduler};

/// A started service: session API plus its background workers
pub struct AuthService {
    sessions: Arc<SessionManager>,
    pool: SqlitePool,
    cancel: CancellationToken,
    email_worker: JoinHandle<()>,
    sweeper: JoinHandle<crate::sweeper::SweepReport>,
}

impl AuthService {
    /// Connect, migrate and start the mail worker and sweep scheduler.
    pub async fn start(config: &AppConfig) -> AuthResult<Self> {
        Self::start_with_hasher(config, CredentialHasher::new()).await
    }

    pub async fn start_with_hasher(config: &AppConfig, hasher: CredentialHasher) -> AuthResult<Self> {
        let pool = db::connect(&config.database).await?;
        db::migrate(&pool).await?;

        let jwt = Arc::new(JwtManager::new(&config.jwt)?);
        let scheduler = SweepScheduler::new(&config.sweeper)?;
        let expiry = ExpirySweeper::new(pool.clone(), &config.sweeper)?;
        let transport = transport_from_config(config.smtp.as_ref())?;
        let (mailer, worker) = email_queue(DEFAULT_QUEUE_CAPACITY, transport);

        let cancel = CancellationToken::new();
        let email_worker = worker.spawn(cancel.child_token());
        let sweeper = scheduler.spawn(expiry, cancel.child_token());

        let sessions = Arc::new(SessionManager::new(
            pool.clone(),
            jwt,
            hasher,
            Arc::new(mailer),
            &config.verification,
        ));

        tracing::info!(
            smtp = config.smtp.is_some(),
            sweep = config.sweeper.enabled,
            "auth service started"
        );
        Ok(Self {
            sessions,
            pool,
            cancel,
            email_worker,
            sweeper,
        })
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Stop background work, flush queued mail and close the pool.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.email_worker.await {
            tracing::error!(error = %e, "email worker panicked");
        }
        match self.sweeper.await {
            Ok(report) => tracing::debug!(runs = report.runs, "sweeper finished"),
            Err(e) => tracing::error!(error = %e, "sweeper panicked"),
        }
        self.pool.close().await;
        tracing::info!("auth service stopped");
    }
}
