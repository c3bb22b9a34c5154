//! # Session Manager
//!
//! Signup, verification, login, refresh and logout. Each operation runs
//! its store reads and writes inside one transaction, so a concurrent
//! reader never sees a half-finished state change (for example a token
//! already blacklisted but still whitelisted).
//!
//! Refresh token lifecycle:
//!
//! ```text
//! login ──> ISSUED (whitelist) ──logout──> REVOKED (blacklist only)
//!              │
//!              └──refresh after expires_at──> EXPIRED (row deleted)
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::OnceCell;

use super::crypto::{generate_verification_code, CredentialHasher};
use super::email::{EmailSender, EmailTemplate};
use super::errors::{AuthError, AuthResult};
use super::jwt::{JwtManager, TokenScope};
use super::refresh_token::{self, TokenList};
use super::user::{self, normalize_email, NewUser, ProfileUpdate, User, UserStatus};
use super::verify_code;
use crate::config::VerificationConfig;
use crate::db;

/// Password hashed once and checked against on unknown-email logins
const DUMMY_PASSWORD: &str = "brewauth-dummy-password";

/// Tokens returned by a successful login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signup input
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SignupRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }
}

/// Orchestrates the credential, token and code stores
pub struct SessionManager {
    pool: SqlitePool,
    jwt: Arc<JwtManager>,
    hasher: CredentialHasher,
    mailer: Arc<dyn EmailSender>,
    code_ttl_minutes: i64,
    dummy_digest: OnceCell<String>,
}

impl SessionManager {
    pub fn new(
        pool: SqlitePool,
        jwt: Arc<JwtManager>,
        hasher: CredentialHasher,
        mailer: Arc<dyn EmailSender>,
        verification: &VerificationConfig,
    ) -> Self {
        Self {
            pool,
            jwt,
            hasher,
            mailer,
            code_ttl_minutes: verification.code_ttl_minutes,
            dummy_digest: OnceCell::new(),
        }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    // ==================
    // Signup & Verification
    // ==================

    /// Register an unverified user and mail them a verification code.
    ///
    /// The mail is queued only after the user and code are committed; a
    /// failure to queue it is logged and does not undo the signup.
    pub async fn signup(&self, request: SignupRequest) -> AuthResult<User> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }
        if request.password.is_empty() {
            return Err(AuthError::Validation("Password cannot be empty".to_string()));
        }

        let password_hash = self.hash_password(request.password).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        if user::find_by_email(&mut tx, &email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let mut new_user = NewUser::new(&email, password_hash);
        new_user.first_name = request.first_name;
        new_user.last_name = request.last_name;
        let created = user::create(&mut tx, &new_user).await?;

        let code = generate_verification_code();
        let expires_at = Duration::try_minutes(self.code_ttl_minutes)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Config(format!(
                    "VERIFY_CODE_EXPIRE_MINUTES: {} out of range",
                    self.code_ttl_minutes
                ))
            })?;
        verify_code::create(&mut tx, created.id, &code, expires_at).await?;
        tx.commit().await?;

        tracing::info!(user_id = created.id, "user signed up");

        let template = EmailTemplate::Verification {
            user_email: created.email.clone(),
            code,
            expires_minutes: self.code_ttl_minutes,
        };
        if let Err(e) = self.mailer.send(template) {
            tracing::warn!(user_id = created.id, error = %e, "verification email not queued");
        }

        Ok(created)
    }

    /// Mark the owner of `code` verified.
    ///
    /// Codes are single-use: on success every outstanding code of the user
    /// is deleted.
    pub async fn verify_account(&self, code: &str, email: &str) -> AuthResult<()> {
        let mut tx = db::begin_write(&self.pool).await?;

        let record = verify_code::redeem(&mut tx, code, email)
            .await?
            .ok_or(AuthError::InvalidCode)?;
        if record.is_expired_at(Utc::now()) {
            return Err(AuthError::CodeExpired);
        }

        user::set_status(&mut tx, record.user_id, UserStatus::Verified).await?;
        verify_code::delete_for_user(&mut tx, record.user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = record.user_id, "account verified");
        Ok(())
    }

    // ==================
    // Token Lifecycle
    // ==================

    /// Authenticate and issue an access/refresh token pair
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let found = {
            let mut conn = self.pool.acquire().await?;
            user::find_by_email(&mut conn, email).await?
        };

        let user = match found {
            Some(user) if self.check_password(password, &user.password).await? => user,
            Some(_) => {
                tracing::info!("login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                // Same hashing work as a wrong password on a real account.
                let digest = self.dummy_digest().await?;
                self.check_password(password, digest).await?;
                tracing::info!("login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };
        if !user.is_verified() {
            tracing::info!(user_id = user.id, "login rejected: account unverified");
            return Err(AuthError::AccountUnverified);
        }

        let access = self.jwt.issue_access(user.id, user.role)?;
        let refresh = self.jwt.issue_refresh(user.id)?;

        let mut tx = db::begin_write(&self.pool).await?;
        refresh_token::save(&mut tx, user.id, &refresh.token, refresh.expires_at).await?;
        tx.commit().await?;

        tracing::info!(user_id = user.id, "user logged in");
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated.
    pub async fn refresh(&self, token: &str) -> AuthResult<String> {
        let mut tx = db::begin_write(&self.pool).await?;

        if refresh_token::is_blacklisted(&mut tx, token).await? {
            return Err(AuthError::TokenRevoked);
        }

        let record = refresh_token::find(&mut tx, token, TokenList::Whitelist)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if record.is_expired_at(Utc::now()) {
            refresh_token::delete(&mut tx, token, TokenList::Whitelist).await?;
            tx.commit().await?;
            tracing::info!(user_id = record.user_id, "expired refresh token removed");
            return Err(AuthError::RefreshTokenExpired);
        }

        let claims = self.jwt.verify(token, TokenScope::Refresh)?;
        let user_id = claims.user_id()?;
        if user_id != record.user_id {
            return Err(AuthError::InvalidRefreshToken);
        }

        let owner = user::find_by_id(&mut tx, user_id)
            .await?
            .ok_or_else(|| AuthError::not_found("User"))?;
        tx.commit().await?;

        let access = self.jwt.issue_access(owner.id, owner.role)?;
        tracing::debug!(user_id = owner.id, "access token refreshed");
        Ok(access.token)
    }

    /// Revoke a refresh token: blacklist it and drop its whitelist entry
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        self.jwt.verify(token, TokenScope::Refresh)?;

        let mut tx = db::begin_write(&self.pool).await?;
        let record = refresh_token::find(&mut tx, token, TokenList::Whitelist)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        match refresh_token::blacklist(&mut tx, record.user_id, token, record.expires_at).await {
            // Already revoked.
            Err(AuthError::DuplicateToken) => return Err(AuthError::TokenRevoked),
            other => other?,
        }
        refresh_token::delete(&mut tx, token, TokenList::Whitelist).await?;
        tx.commit().await?;

        tracing::info!(user_id = record.user_id, "user logged out");
        Ok(())
    }

    // ==================
    // Access Checks
    // ==================

    /// Resolve the user behind an access token
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<User> {
        let claims = self.jwt.verify(access_token, TokenScope::Access)?;
        let user_id = claims.user_id()?;

        let mut conn = self.pool.acquire().await?;
        user::find_by_id(&mut conn, user_id)
            .await?
            .ok_or_else(|| AuthError::not_found("User"))
    }

    /// Like [`authenticate`](Self::authenticate) but only for admins
    pub async fn require_admin(&self, access_token: &str) -> AuthResult<User> {
        let user = self.authenticate(access_token).await?;
        if !user.is_admin() {
            return Err(AuthError::Forbidden("Admin privileges required".to_string()));
        }
        Ok(user)
    }

    // ==================
    // User Administration
    // ==================

    /// All users; admins only
    pub async fn list_users(&self, access_token: &str) -> AuthResult<Vec<User>> {
        self.require_admin(access_token).await?;
        let mut conn = self.pool.acquire().await?;
        user::list(&mut conn).await
    }

    /// One user by id; admins only
    pub async fn get_user(&self, access_token: &str, id: i64) -> AuthResult<User> {
        self.require_admin(access_token).await?;
        let mut conn = self.pool.acquire().await?;
        user::find_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AuthError::not_found("User"))
    }

    /// Partially update a profile.
    ///
    /// Users may update themselves; admins may update anyone.
    pub async fn update_user(
        &self,
        access_token: &str,
        id: i64,
        update: &ProfileUpdate,
    ) -> AuthResult<User> {
        let caller = self.authenticate(access_token).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        if user::find_by_id(&mut tx, id).await?.is_none() {
            return Err(AuthError::not_found("User"));
        }
        if caller.id != id && !caller.is_admin() {
            return Err(AuthError::Forbidden("Not enough permissions".to_string()));
        }
        let updated = user::update_profile(&mut tx, id, update).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, by = caller.id, "profile updated");
        Ok(updated)
    }

    /// Delete a user with its codes and tokens; admins only
    pub async fn delete_user(&self, access_token: &str, id: i64) -> AuthResult<()> {
        let admin = self.require_admin(access_token).await?;

        let mut tx = db::begin_write(&self.pool).await?;
        user::delete(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, by = admin.id, "user deleted");
        Ok(())
    }

    // ==================
    // Password Hashing
    // ==================

    async fn dummy_digest(&self) -> AuthResult<&str> {
        let digest = self
            .dummy_digest
            .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD.to_string()))
            .await?;
        Ok(digest.as_str())
    }

    async fn hash_password(&self, password: String) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    async fn check_password(&self, password: &str, digest: &str) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let digest = digest.to_owned();
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&password, &digest)).await?)
    }
}

/// Basic email validation
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::Role;
    use crate::config::JwtConfig;
    use crate::db;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailTemplate>>,
    }

    impl EmailSender for RecordingSender {
        fn send(&self, template: EmailTemplate) -> AuthResult<()> {
            self.sent.lock().unwrap().push(template);
            Ok(())
        }
    }

    struct FailingSender;

    impl EmailSender for FailingSender {
        fn send(&self, _template: EmailTemplate) -> AuthResult<()> {
            Err(AuthError::Email("smtp down".to_string()))
        }
    }

    async fn manager_with(mailer: Arc<dyn EmailSender>) -> SessionManager {
        let pool = db::connect_in_memory().await.unwrap();
        let jwt = JwtManager::new(&JwtConfig::new("session-test-secret-session-test")).unwrap();
        SessionManager::new(
            pool,
            Arc::new(jwt),
            CredentialHasher::with_cost(1024, 1, 1).unwrap(),
            mailer,
            &VerificationConfig::default(),
        )
    }

    fn last_code(sender: &RecordingSender) -> String {
        match sender.sent.lock().unwrap().last().cloned() {
            Some(EmailTemplate::Verification { code, .. }) => code,
            None => panic!("no verification mail sent"),
        }
    }

    async fn verified_user(manager: &SessionManager, sender: &RecordingSender, email: &str) -> User {
        let user = manager
            .signup(SignupRequest::new(email, "espresso"))
            .await
            .unwrap();
        manager.verify_account(&last_code(sender), email).await.unwrap();
        user
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@example.co.uk"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@.com"));
    }

    #[tokio::test]
    async fn test_signup_creates_unverified_user_and_mails_code() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;

        let user = manager
            .signup(SignupRequest {
                first_name: Some("Ada".to_string()),
                ..SignupRequest::new("  New@Example.com ", "espresso")
            })
            .await
            .unwrap();

        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.status, UserStatus::Unverified);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_ne!(user.password, "espresso");

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            EmailTemplate::Verification {
                user_email,
                code,
                expires_minutes,
            } => {
                assert_eq!(user_email, "new@example.com");
                assert_eq!(code.len(), 6);
                assert_eq!(*expires_minutes, 2);
            }
        }
    }

    #[tokio::test]
    async fn test_signup_survives_mail_failure() {
        let manager = manager_with(Arc::new(FailingSender)).await;
        let user = manager
            .signup(SignupRequest::new("quiet@example.com", "espresso"))
            .await
            .unwrap();

        let mut conn = manager.pool.acquire().await.unwrap();
        assert!(user::find_by_id(&mut conn, user.id).await.unwrap().is_some());
        assert_eq!(verify_code::count_for_user(&mut conn, user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_signup_rejects_bad_input() {
        let manager = manager_with(Arc::new(RecordingSender::default())).await;

        assert!(matches!(
            manager.signup(SignupRequest::new("not-an-email", "pw")).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            manager.signup(SignupRequest::new("a@example.com", "")).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_verification_code_is_single_use() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        manager
            .signup(SignupRequest::new("once@example.com", "espresso"))
            .await
            .unwrap();
        let code = last_code(&sender);

        manager.verify_account(&code, "once@example.com").await.unwrap();
        assert!(matches!(
            manager.verify_account(&code, "once@example.com").await,
            Err(AuthError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_and_wrong_password() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        verified_user(&manager, &sender, "known@example.com").await;

        assert!(matches!(
            manager.login("nobody@example.com", "espresso").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            manager.login("known@example.com", "decaf").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_requires_verified_account() {
        let manager = manager_with(Arc::new(RecordingSender::default())).await;
        manager
            .signup(SignupRequest::new("pending@example.com", "espresso"))
            .await
            .unwrap();

        let err = manager.login("pending@example.com", "espresso").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountUnverified));
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_login_whitelists_refresh_token() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        let user = verified_user(&manager, &sender, "login@example.com").await;

        let pair = manager.login("LOGIN@example.com", "espresso").await.unwrap();

        let mut conn = manager.pool.acquire().await.unwrap();
        let record = refresh_token::find(&mut conn, &pair.refresh_token, TokenList::Whitelist)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, user.id);

        let claims = manager.jwt().verify(&pair.access_token, TokenScope::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, Some(Role::User));
    }

    #[tokio::test]
    async fn test_two_logins_issue_distinct_refresh_tokens() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        verified_user(&manager, &sender, "twice@example.com").await;

        let first = manager.login("twice@example.com", "espresso").await.unwrap();
        let second = manager.login("twice@example.com", "espresso").await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_issues_access_token_for_same_subject() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        let user = verified_user(&manager, &sender, "refresh@example.com").await;
        let pair = manager.login("refresh@example.com", "espresso").await.unwrap();

        let access = manager.refresh(&pair.refresh_token).await.unwrap();
        let claims = manager.jwt().verify(&access, TokenScope::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, Some(Role::User));

        // Not rotated: the same refresh token keeps working.
        assert!(manager.refresh(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token_and_unknown_token() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        verified_user(&manager, &sender, "scope@example.com").await;
        let pair = manager.login("scope@example.com", "espresso").await.unwrap();

        assert!(matches!(
            manager.refresh(&pair.access_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            manager.refresh("garbage").await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        verified_user(&manager, &sender, "bye@example.com").await;
        let pair = manager.login("bye@example.com", "espresso").await.unwrap();

        manager.logout(&pair.refresh_token).await.unwrap();

        let mut conn = manager.pool.acquire().await.unwrap();
        assert!(refresh_token::is_blacklisted(&mut conn, &pair.refresh_token).await.unwrap());
        assert!(refresh_token::find(&mut conn, &pair.refresh_token, TokenList::Whitelist)
            .await
            .unwrap()
            .is_none());
        drop(conn);

        assert!(matches!(
            manager.refresh(&pair.refresh_token).await,
            Err(AuthError::TokenRevoked)
        ));
        assert!(matches!(
            manager.logout(&pair.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_requires_refresh_scope() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        verified_user(&manager, &sender, "wrong@example.com").await;
        let pair = manager.login("wrong@example.com", "espresso").await.unwrap();

        assert!(matches!(
            manager.logout(&pair.access_token).await,
            Err(AuthError::InvalidScope)
        ));
        assert!(matches!(
            manager.logout("garbage").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_of_unwhitelisted_token() {
        let manager = manager_with(Arc::new(RecordingSender::default())).await;
        let orphan = manager.jwt().issue_refresh(77).unwrap();

        assert!(matches!(
            manager.logout(&orphan.token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_and_require_admin() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        let user = verified_user(&manager, &sender, "boss@example.com").await;
        let pair = manager.login("boss@example.com", "espresso").await.unwrap();

        let current = manager.authenticate(&pair.access_token).await.unwrap();
        assert_eq!(current.id, user.id);
        assert!(matches!(
            manager.authenticate(&pair.refresh_token).await,
            Err(AuthError::InvalidScope)
        ));
        assert!(matches!(
            manager.require_admin(&pair.access_token).await,
            Err(AuthError::Forbidden(_))
        ));

        {
            let mut conn = manager.pool.acquire().await.unwrap();
            user::set_role(&mut conn, user.id, Role::Admin).await.unwrap();
        }
        let admin = manager.require_admin(&pair.access_token).await.unwrap();
        assert!(admin.is_admin());
    }

    #[tokio::test]
    async fn test_authenticate_deleted_user() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        let user = verified_user(&manager, &sender, "gone@example.com").await;
        let pair = manager.login("gone@example.com", "espresso").await.unwrap();

        {
            let mut conn = manager.pool.acquire().await.unwrap();
            user::delete(&mut conn, user.id).await.unwrap();
        }
        assert!(matches!(
            manager.authenticate(&pair.access_token).await,
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            manager.refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_unknown_email_still_runs_password_check() {
        let manager = manager_with(Arc::new(RecordingSender::default())).await;
        assert!(manager.dummy_digest.get().is_none());

        assert!(matches!(
            manager.login("stranger@example.com", "espresso").await,
            Err(AuthError::InvalidCredentials)
        ));
        let digest = manager.dummy_digest.get().unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(manager.hasher.verify(DUMMY_PASSWORD, digest));
    }

    async fn admin_and_member(
        manager: &SessionManager,
        sender: &RecordingSender,
    ) -> (User, TokenPair, User, TokenPair) {
        let admin = verified_user(manager, sender, "admin@example.com").await;
        let member = verified_user(manager, sender, "member@example.com").await;
        {
            let mut conn = manager.pool.acquire().await.unwrap();
            user::set_role(&mut conn, admin.id, Role::Admin).await.unwrap();
        }
        let admin_pair = manager.login("admin@example.com", "espresso").await.unwrap();
        let member_pair = manager.login("member@example.com", "espresso").await.unwrap();
        (admin, admin_pair, member, member_pair)
    }

    #[tokio::test]
    async fn test_admin_only_user_listing_and_lookup() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        let (_, admin_pair, member, member_pair) = admin_and_member(&manager, &sender).await;

        assert_eq!(manager.list_users(&admin_pair.access_token).await.unwrap().len(), 2);
        assert_eq!(
            manager.get_user(&admin_pair.access_token, member.id).await.unwrap().email,
            "member@example.com"
        );
        assert!(matches!(
            manager.get_user(&admin_pair.access_token, 9999).await,
            Err(AuthError::NotFound(_))
        ));

        assert!(matches!(
            manager.list_users(&member_pair.access_token).await,
            Err(AuthError::Forbidden(_))
        ));
        assert!(matches!(
            manager.get_user(&member_pair.access_token, member.id).await,
            Err(AuthError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user_self_or_admin() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        let (admin, admin_pair, member, member_pair) = admin_and_member(&manager, &sender).await;

        let own = ProfileUpdate {
            first_name: Some("Mia".to_string()),
            ..ProfileUpdate::default()
        };
        let updated = manager
            .update_user(&member_pair.access_token, member.id, &own)
            .await
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Mia"));

        assert!(matches!(
            manager.update_user(&member_pair.access_token, admin.id, &own).await,
            Err(AuthError::Forbidden(_))
        ));
        assert!(matches!(
            manager.update_user(&member_pair.access_token, 9999, &own).await,
            Err(AuthError::NotFound(_))
        ));

        let by_admin = ProfileUpdate {
            last_name: Some("Rossi".to_string()),
            ..ProfileUpdate::default()
        };
        let updated = manager
            .update_user(&admin_pair.access_token, member.id, &by_admin)
            .await
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Mia"));
        assert_eq!(updated.last_name.as_deref(), Some("Rossi"));

        let taken = ProfileUpdate {
            email: Some("ADMIN@example.com".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            manager.update_user(&member_pair.access_token, member.id, &taken).await,
            Err(AuthError::EmailInUse)
        ));
    }

    #[tokio::test]
    async fn test_delete_user_admin_only() {
        let sender = Arc::new(RecordingSender::default());
        let manager = manager_with(sender.clone()).await;
        let (admin, admin_pair, member, member_pair) = admin_and_member(&manager, &sender).await;

        assert!(matches!(
            manager.delete_user(&member_pair.access_token, admin.id).await,
            Err(AuthError::Forbidden(_))
        ));

        manager.delete_user(&admin_pair.access_token, member.id).await.unwrap();
        assert!(matches!(
            manager.delete_user(&admin_pair.access_token, member.id).await,
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            manager.refresh(&member_pair.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }
}
