//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use brewauth::auth::crypto::CredentialHasher;
use brewauth::auth::email::{EmailSender, EmailTemplate};
use brewauth::auth::errors::AuthResult;
use brewauth::auth::jwt::JwtManager;
use brewauth::auth::session::{SessionManager, SignupRequest};
use brewauth::auth::user::User;
use brewauth::config::{DatabaseConfig, JwtConfig, VerificationConfig};
use brewauth::db;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const PASSWORD: &str = "flat-white-2025";

/// Captures every mail instead of delivering it
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<EmailTemplate>>,
}

impl Outbox {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_code_for(&self, email: &str) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|template| match template {
                EmailTemplate::Verification { user_email, code, .. } if user_email == email => {
                    Some(code.clone())
                }
                _ => None,
            })
            .expect("no verification mail for address")
    }
}

impl EmailSender for Outbox {
    fn send(&self, template: EmailTemplate) -> AuthResult<()> {
        self.sent.lock().unwrap().push(template);
        Ok(())
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub sessions: Arc<SessionManager>,
    pub outbox: Arc<Outbox>,
    _dir: Option<TempDir>,
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig::new("integration-secret-integration-secret")
}

pub fn fast_hasher() -> CredentialHasher {
    CredentialHasher::with_cost(1024, 1, 1).unwrap()
}

pub async fn harness() -> Harness {
    let pool = db::connect_in_memory().await.unwrap();
    build(pool, None)
}

/// Harness over a file-backed store with a multi-connection pool
pub async fn file_harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::connect(&DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("sessions.db").display()),
        ..DatabaseConfig::default()
    })
    .await
    .unwrap();
    db::migrate(&pool).await.unwrap();
    build(pool, Some(dir))
}

fn build(pool: SqlitePool, dir: Option<TempDir>) -> Harness {
    let outbox = Arc::new(Outbox::default());
    let jwt = Arc::new(JwtManager::new(&jwt_config()).unwrap());
    let sessions = Arc::new(SessionManager::new(
        pool.clone(),
        jwt,
        fast_hasher(),
        outbox.clone(),
        &VerificationConfig::default(),
    ));
    Harness {
        pool,
        sessions,
        outbox,
        _dir: dir,
    }
}

impl Harness {
    pub async fn signup(&self, email: &str) -> User {
        self.sessions
            .signup(SignupRequest::new(email, PASSWORD))
            .await
            .unwrap()
    }

    /// Sign up and complete verification with the mailed code
    pub async fn verified(&self, email: &str) -> User {
        let user = self.signup(email).await;
        let code = self.outbox.last_code_for(&user.email);
        self.sessions.verify_account(&code, email).await.unwrap();
        user
    }
}
