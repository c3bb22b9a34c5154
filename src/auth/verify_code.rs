//! # Verification Codes
//!
//! Short numeric codes mailed at signup. A code is bound to one user and
//! only valid together with that user's email address.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::errors::AuthResult;
use super::user::normalize_email;

/// A stored verification code
#[derive(Debug, Clone, FromRow)]
pub struct VerifyCode {
    pub id: i64,
    pub code: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl VerifyCode {
    /// Expired once `expires_at` lies strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Store a new code for `user_id`
pub async fn create(
    conn: &mut SqliteConnection,
    user_id: i64,
    code: &str,
    expires_at: DateTime<Utc>,
) -> AuthResult<i64> {
    let result = sqlx::query("INSERT INTO verify_codes (code, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(code)
        .bind(user_id)
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Find the code matching `code` whose owner has address `email`.
///
/// Only existence is checked here; expiry is the caller's decision.
pub async fn redeem(
    conn: &mut SqliteConnection,
    code: &str,
    email: &str,
) -> AuthResult<Option<VerifyCode>> {
    let record = sqlx::query_as::<_, VerifyCode>(
        "SELECT vc.id, vc.code, vc.user_id, vc.expires_at
         FROM verify_codes vc
         JOIN users u ON u.id = vc.user_id
         WHERE vc.code = ? AND u.email = ?
         ORDER BY vc.expires_at DESC
         LIMIT 1",
    )
    .bind(code)
    .bind(normalize_email(email))
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

/// Drop every outstanding code of a user; returns how many were removed
pub async fn delete_for_user(conn: &mut SqliteConnection, user_id: i64) -> AuthResult<u64> {
    let result = sqlx::query("DELETE FROM verify_codes WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_for_user(conn: &mut SqliteConnection, user_id: i64) -> AuthResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM verify_codes WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::{self, NewUser};
    use crate::db;
    use chrono::Duration;

    #[tokio::test]
    async fn test_redeem_requires_matching_email() {
        let pool = db::connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = user::create(&mut conn, &NewUser::new("owner@example.com", "h")).await.unwrap();
        user::create(&mut conn, &NewUser::new("other@example.com", "h")).await.unwrap();

        create(&mut conn, owner.id, "123456", Utc::now() + Duration::minutes(2))
            .await
            .unwrap();

        let found = redeem(&mut conn, "123456", " OWNER@example.com").await.unwrap().unwrap();
        assert_eq!(found.user_id, owner.id);
        assert_eq!(found.code, "123456");

        assert!(redeem(&mut conn, "123456", "other@example.com").await.unwrap().is_none());
        assert!(redeem(&mut conn, "654321", "owner@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_rows_are_still_returned() {
        let pool = db::connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = user::create(&mut conn, &NewUser::new("late@example.com", "h")).await.unwrap();

        create(&mut conn, owner.id, "111111", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        let found = redeem(&mut conn, "111111", "late@example.com").await.unwrap().unwrap();
        assert!(found.is_expired_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_multiple_codes_and_delete_for_user() {
        let pool = db::connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let owner = user::create(&mut conn, &NewUser::new("many@example.com", "h")).await.unwrap();

        let expires = Utc::now() + Duration::minutes(2);
        create(&mut conn, owner.id, "222222", expires).await.unwrap();
        create(&mut conn, owner.id, "333333", expires).await.unwrap();
        assert_eq!(count_for_user(&mut conn, owner.id).await.unwrap(), 2);

        assert_eq!(delete_for_user(&mut conn, owner.id).await.unwrap(), 2);
        assert_eq!(count_for_user(&mut conn, owner.id).await.unwrap(), 0);
        assert!(redeem(&mut conn, "222222", "many@example.com").await.unwrap().is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let code = VerifyCode {
            id: 1,
            code: "123456".to_string(),
            user_id: 1,
            expires_at: now,
        };
        assert!(!code.is_expired_at(now));
        assert!(code.is_expired_at(now + Duration::seconds(1)));
    }
}
