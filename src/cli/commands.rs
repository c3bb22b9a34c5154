//! CLI command implementations
//!
//! Every command loads [`AppConfig`] from the environment and brings the
//! schema up to date before doing its work.

use sqlx::SqlitePool;

use crate::auth::errors::{AuthError, AuthResult};
use crate::auth::user::{self, Role};
use crate::config::AppConfig;
use crate::db;
use crate::service::AuthService;
use crate::sweeper::ExpirySweeper;

use super::args::Command;

/// Dispatch a parsed command
pub async fn run_command(command: Command) -> AuthResult<()> {
    let config = AppConfig::from_env()?;
    execute(command, &config).await
}

pub async fn execute(command: Command, config: &AppConfig) -> AuthResult<()> {
    match command {
        Command::Run => run_service(config).await,
        Command::Migrate => {
            open_store(config).await?.close().await;
            println!("Migrations applied");
            Ok(())
        }
        Command::Sweep => {
            let pool = open_store(config).await?;
            let result = match ExpirySweeper::new(pool.clone(), &config.sweeper) {
                Ok(sweeper) => sweeper.sweep_once().await,
                Err(e) => Err(e),
            };
            pool.close().await;
            println!("Deleted {} unverified user(s)", result?);
            Ok(())
        }
        Command::Users => {
            let pool = open_store(config).await?;
            let result = list_users_json(&pool).await;
            pool.close().await;
            println!("{}", result?);
            Ok(())
        }
        Command::Promote { email } => {
            let pool = open_store(config).await?;
            let result = promote(&pool, &email).await;
            pool.close().await;
            let promoted = result?;
            println!("{} is now an admin (id {})", promoted.email, promoted.id);
            Ok(())
        }
    }
}

/// Connect and bring the schema up to date
async fn open_store(config: &AppConfig) -> AuthResult<SqlitePool> {
    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;
    Ok(pool)
}

async fn run_service(config: &AppConfig) -> AuthResult<()> {
    let service = AuthService::start(config).await?;
    tracing::info!("press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await;
    service.shutdown().await;
    signal.map_err(|e| AuthError::Internal(format!("signal handler: {}", e)))
}

async fn list_users_json(pool: &SqlitePool) -> AuthResult<String> {
    let mut conn = pool.acquire().await?;
    let users = user::list(&mut conn).await?;
    serde_json::to_string_pretty(&users).map_err(|e| AuthError::Internal(e.to_string()))
}

async fn promote(pool: &SqlitePool, email: &str) -> AuthResult<user::User> {
    let mut tx = db::begin_write(pool).await?;
    let found = user::find_by_email(&mut tx, email)
        .await?
        .ok_or_else(|| AuthError::not_found("User"))?;
    user::set_role(&mut tx, found.id, Role::Admin).await?;
    let promoted = user::find_by_id(&mut tx, found.id)
        .await?
        .ok_or_else(|| AuthError::not_found("User"))?;
    tx.commit().await?;

    tracing::info!(user_id = promoted.id, "user promoted to admin");
    Ok(promoted)
}
