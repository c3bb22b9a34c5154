//! # Refresh Token Store
//!
//! Two tables back the refresh-token lifecycle: the whitelist of issued,
//! still-usable tokens and the blacklist of tokens revoked at logout.
//! A blacklisted token is never accepted again, whatever the whitelist
//! says.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::errors::{AuthError, AuthResult};

/// Which of the two token tables to address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenList {
    Whitelist,
    Blacklist,
}

impl TokenList {
    fn table(&self) -> &'static str {
        match self {
            TokenList::Whitelist => "refresh_tokens",
            TokenList::Blacklist => "blacklist_refresh_tokens",
        }
    }
}

/// A row of either token table
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Expired once `expires_at` lies strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

async fn insert(
    conn: &mut SqliteConnection,
    list: TokenList,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> AuthResult<()> {
    sqlx::query(&format!(
        "INSERT INTO {} (user_id, token, expires_at) VALUES (?, ?, ?)",
        list.table()
    ))
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if AuthError::is_unique_violation(&e) {
            AuthError::DuplicateToken
        } else {
            AuthError::Database(e)
        }
    })?;
    Ok(())
}

/// Whitelist a newly issued token
pub async fn save(
    conn: &mut SqliteConnection,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> AuthResult<()> {
    insert(conn, TokenList::Whitelist, user_id, token, expires_at).await
}

/// Record a revoked token.
///
/// The whitelist row is left alone; callers remove it with [`delete`].
pub async fn blacklist(
    conn: &mut SqliteConnection,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> AuthResult<()> {
    insert(conn, TokenList::Blacklist, user_id, token, expires_at).await
}

pub async fn find(
    conn: &mut SqliteConnection,
    token: &str,
    list: TokenList,
) -> AuthResult<Option<RefreshTokenRecord>> {
    let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
        "SELECT id, user_id, token, expires_at FROM {} WHERE token = ?",
        list.table()
    ))
    .bind(token)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn is_blacklisted(conn: &mut SqliteConnection, token: &str) -> AuthResult<bool> {
    Ok(find(conn, token, TokenList::Blacklist).await?.is_some())
}

/// Remove a token from `list`; absent tokens are a no-op.
///
/// Returns whether a row was removed.
pub async fn delete(conn: &mut SqliteConnection, token: &str, list: TokenList) -> AuthResult<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE token = ?", list.table()))
        .bind(token)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
