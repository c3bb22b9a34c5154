//! # Configuration
//!
//! Settings are read once at startup from the environment (optionally
//! seeded from a `.env` file) and handed to each component explicitly.

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::auth::errors::{AuthError, AuthResult};
use crate::config_validator::{format_validation_errors, ConfigValidator};

/// Minimum accepted length of the signing secret
const MIN_SECRET_LEN: usize = 32;

/// Signing algorithms usable with a shared secret
const HMAC_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512"];

/// Upper bound for token lifetimes, in minutes (one year)
pub(crate) const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Upper bound for the unverified-account retention, in hours (one year)
pub(crate) const MAX_RETENTION_HOURS: i64 = 365 * 24;

// ==================
// Sections
// ==================

/// Relational store settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://brewauth.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

/// Token signing settings
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

impl JwtConfig {
    /// Config with the default algorithm and lifetimes
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            access_ttl_minutes: 30,
            refresh_ttl_minutes: 1440,
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_minutes", &self.refresh_ttl_minutes)
            .finish()
    }
}

/// Email verification settings
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub code_ttl_minutes: i64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { code_ttl_minutes: 2 }
    }
}

/// Outbound SMTP settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

/// Unverified-account sweep settings
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub enabled: bool,
    /// Cron expression (minute resolution)
    pub schedule: String,
    /// How long an unverified account may exist before removal
    pub unverified_retention_hours: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "* * * * *".to_string(),
            unverified_retention_hours: 48,
        }
    }
}

// ==================
// Application Config
// ==================

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub verification: VerificationConfig,
    pub smtp: Option<SmtpConfig>,
    pub sweeper: SweeperConfig,
}

impl AppConfig {
    /// Load from `.env` (if present) and the process environment
    pub fn from_env() -> AuthResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build and validate the config from a key lookup function
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut v = ConfigValidator::new();

        let db_defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").unwrap_or(db_defaults.url),
            max_connections: v.parse_or(
                "DB_MAX_CONNECTIONS",
                lookup("DB_MAX_CONNECTIONS"),
                db_defaults.max_connections,
            ),
            acquire_timeout_secs: v.parse_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                lookup("DB_ACQUIRE_TIMEOUT_SECS"),
                db_defaults.acquire_timeout_secs,
            ),
        };
        v.validate_non_empty("DATABASE_URL", &database.url)
            .validate_range("DB_MAX_CONNECTIONS", database.max_connections as i64, 1, 100)
            .validate_range(
                "DB_ACQUIRE_TIMEOUT_SECS",
                database.acquire_timeout_secs as i64,
                1,
                300,
            );

        let secret = v.require("SECRET_KEY", lookup("SECRET_KEY"));
        let algorithm_name = lookup("ALGORITHM").unwrap_or_else(|| "HS256".to_string());
        v.validate_secret_len("SECRET_KEY", &secret, MIN_SECRET_LEN)
            .validate_one_of("ALGORITHM", &algorithm_name, HMAC_ALGORITHMS);
        let jwt = JwtConfig {
            secret,
            algorithm: Algorithm::from_str(&algorithm_name).unwrap_or(Algorithm::HS256),
            access_ttl_minutes: v.parse_or(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                lookup("ACCESS_TOKEN_EXPIRE_MINUTES"),
                30,
            ),
            refresh_ttl_minutes: v.parse_or(
                "REFRESH_TOKEN_EXPIRE_MINUTES",
                lookup("REFRESH_TOKEN_EXPIRE_MINUTES"),
                1440,
            ),
        };
        v.validate_range(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            jwt.access_ttl_minutes,
            1,
            MAX_TOKEN_TTL_MINUTES,
        )
        .validate_range(
            "REFRESH_TOKEN_EXPIRE_MINUTES",
            jwt.refresh_ttl_minutes,
            1,
            MAX_TOKEN_TTL_MINUTES,
        );

        let verification = VerificationConfig {
            code_ttl_minutes: v.parse_or(
                "VERIFY_CODE_EXPIRE_MINUTES",
                lookup("VERIFY_CODE_EXPIRE_MINUTES"),
                VerificationConfig::default().code_ttl_minutes,
            ),
        };
        v.validate_range(
            "VERIFY_CODE_EXPIRE_MINUTES",
            verification.code_ttl_minutes,
            1,
            24 * 60,
        );

        let smtp = match lookup("EMAIL_HOST") {
            None => None,
            Some(host) => {
                let port = v.parse_or("EMAIL_PORT", lookup("EMAIL_PORT"), 587u16);
                let username = lookup("EMAIL_HOST_USER");
                let from = lookup("EMAIL_FROM")
                    .or_else(|| username.clone())
                    .unwrap_or_default();
                v.validate_non_empty("EMAIL_HOST", &host)
                    .validate_port("EMAIL_PORT", port)
                    .validate_non_empty("EMAIL_FROM", &from);
                Some(SmtpConfig {
                    host,
                    port,
                    username,
                    password: lookup("EMAIL_HOST_PASSWORD"),
                    from,
                })
            }
        };

        let sweep_defaults = SweeperConfig::default();
        let sweeper = SweeperConfig {
            enabled: v.parse_or("SWEEP_ENABLED", lookup("SWEEP_ENABLED"), sweep_defaults.enabled),
            schedule: lookup("SWEEP_SCHEDULE").unwrap_or(sweep_defaults.schedule),
            unverified_retention_hours: v.parse_or(
                "UNVERIFIED_RETENTION_HOURS",
                lookup("UNVERIFIED_RETENTION_HOURS"),
                sweep_defaults.unverified_retention_hours,
            ),
        };
        v.validate_cron("SWEEP_SCHEDULE", &sweeper.schedule)
            .validate_range(
                "UNVERIFIED_RETENTION_HOURS",
                sweeper.unverified_retention_hours,
                1,
                MAX_RETENTION_HOURS,
            );

        v.finish()
            .map_err(|errors| AuthError::Config(format!("\n{}", format_validation_errors(&errors))))?;

        Ok(Self {
            database,
            jwt,
            verification,
            smtp,
            sweeper,
        })
    }
}
