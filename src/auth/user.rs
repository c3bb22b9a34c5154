//! # Users
//!
//! Account records referenced by every token and verification code.
//! Deleting a user cascades to its codes and both token lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::errors::{AuthError, AuthResult};

/// Whether the user has proven ownership of their email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Unverified,
    Verified,
}

/// Authorization role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// A stored account
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: UserStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.status == UserStatus::Verified
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fields for inserting a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: UserStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    /// Unverified regular user created now
    pub fn new(email: &str, password_hash: impl Into<String>) -> Self {
        Self {
            email: normalize_email(email),
            password_hash: password_hash.into(),
            first_name: None,
            last_name: None,
            status: UserStatus::Unverified,
            role: Role::User,
            created_at: Utc::now(),
        }
    }
}

/// Partial profile update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Canonical form used for storing and comparing addresses
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

const USER_COLUMNS: &str =
    "id, email, password, first_name, last_name, status, role, created_at, updated_at";

// ==================
// Queries
// ==================

/// Insert a user, failing with `EmailInUse` on an address collision
pub async fn create(conn: &mut SqliteConnection, new_user: &NewUser) -> AuthResult<User> {
    let email = normalize_email(&new_user.email);
    let result = sqlx::query(
        "INSERT INTO users (email, password, first_name, last_name, status, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&email)
    .bind(&new_user.password_hash)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(new_user.status)
    .bind(new_user.role)
    .bind(new_user.created_at)
    .bind(new_user.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if AuthError::is_unique_violation(&e) {
            AuthError::EmailInUse
        } else {
            AuthError::Database(e)
        }
    })?;

    find_by_id(conn, result.last_insert_rowid())
        .await?
        .ok_or_else(|| AuthError::not_found("User"))
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> AuthResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

/// Look up by address; the input is normalized first
pub async fn find_by_email(conn: &mut SqliteConnection, email: &str) -> AuthResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(normalize_email(email))
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

pub async fn list(conn: &mut SqliteConnection) -> AuthResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
        .fetch_all(&mut *conn)
        .await?;
    Ok(users)
}

pub async fn set_status(conn: &mut SqliteConnection, id: i64, status: UserStatus) -> AuthResult<()> {
    let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::not_found("User"));
    }
    Ok(())
}

pub async fn set_role(conn: &mut SqliteConnection, id: i64, role: Role) -> AuthResult<()> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::not_found("User"));
    }
    Ok(())
}

/// Apply a partial profile update and return the stored result
pub async fn update_profile(
    conn: &mut SqliteConnection,
    id: i64,
    update: &ProfileUpdate,
) -> AuthResult<User> {
    let current = find_by_id(conn, id)
        .await?
        .ok_or_else(|| AuthError::not_found("User"))?;

    let email = update
        .email
        .as_deref()
        .map(normalize_email)
        .unwrap_or(current.email);
    let first_name = update.first_name.clone().or(current.first_name);
    let last_name = update.last_name.clone().or(current.last_name);

    sqlx::query(
        "UPDATE users SET email = ?, first_name = ?, last_name = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&email)
    .bind(&first_name)
    .bind(&last_name)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if AuthError::is_unique_violation(&e) {
            AuthError::EmailInUse
        } else {
            AuthError::Database(e)
        }
    })?;

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| AuthError::not_found("User"))
}

/// Remove a user together with its codes and tokens
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> AuthResult<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::not_found("User"));
    }
    Ok(())
}
