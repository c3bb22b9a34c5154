//! # Store
//!
//! Connection pool for the relational backing store and the embedded
//! schema migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Transaction;

use crate::auth::errors::{AuthError, AuthResult};
use crate::config::DatabaseConfig;

/// Open a pool for `config.url`.
///
/// An in-memory database lives only as long as its connection, so it is
/// pinned to one connection that is never recycled.
pub async fn connect(config: &DatabaseConfig) -> AuthResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| AuthError::Config(format!("DATABASE_URL: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
    let mut pool_options =
        SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(config.max_connections)
    };

    let pool = pool_options.connect_with(options).await?;
    tracing::debug!(in_memory, "database pool opened");
    Ok(pool)
}

/// Apply pending schema migrations
pub async fn migrate(pool: &SqlitePool) -> AuthResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AuthError::Database(e.into()))?;
    tracing::info!("database schema up to date");
    Ok(())
}

/// Begin a transaction that holds the write lock from its first statement.
///
/// A deferred transaction that reads and then writes can fail with
/// "database is locked" when another writer got in between; an immediate
/// one waits for the lock up front instead.
pub async fn begin_write(pool: &SqlitePool) -> AuthResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Fresh migrated in-memory store
pub async fn connect_in_memory() -> AuthResult<SqlitePool> {
    let pool = connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    })
    .await?;
    migrate(&pool).await?;
    Ok(pool)
}
