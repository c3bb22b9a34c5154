//! # JWT Tokens
//!
//! Signs and verifies the bearer tokens handed out at login. Access and
//! refresh tokens share one format and are told apart by the `scope`
//! claim, so one can never be used in place of the other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{AuthError, AuthResult};
use super::user::Role;
use crate::config::{JwtConfig, MAX_TOKEN_TTL_MINUTES};

/// `iss` claim of every token this service mints
pub const TOKEN_ISSUER: &str = "coffee-shop-api";

/// `aud` claim of every token this service mints
pub const TOKEN_AUDIENCE: &str = "coffee-shop-users";

// ==================
// Claims
// ==================

/// Which kind of credential a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Access,
    Refresh,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Access => "access_token",
            TokenScope::Refresh => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id as a decimal string
    pub sub: String,
    pub scope: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    /// Unique per token; keeps same-second tokens for one user distinct
    pub jti: String,
    /// Only present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl JwtClaims {
    /// Numeric user id from the subject
    pub fn user_id(&self) -> AuthResult<i64> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// A freshly signed token and the wall-clock instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ==================
// JWT Manager
// ==================

/// Token signer/verifier bound to the server secret
#[derive(Clone)]
pub struct JwtManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtManager {
    pub fn new(config: &JwtConfig) -> AuthResult<Self> {
        if !matches!(
            config.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Config(format!(
                "{:?} needs a key pair; only HMAC algorithms are supported",
                config.algorithm
            )));
        }

        let mut validation = Validation::new(config.algorithm);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        Ok(Self {
            algorithm: config.algorithm,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: ttl_minutes("ACCESS_TOKEN_EXPIRE_MINUTES", config.access_ttl_minutes)?,
            refresh_ttl: ttl_minutes("REFRESH_TOKEN_EXPIRE_MINUTES", config.refresh_ttl_minutes)?,
        })
    }

    /// Sign a token for `subject` that expires `ttl` from now
    pub fn sign(
        &self,
        subject: &str,
        role: Option<Role>,
        ttl: Duration,
        scope: TokenScope,
    ) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal(format!("token lifetime {} out of range", ttl)))?;
        let claims = JwtClaims {
            sub: subject.to_string(),
            scope: scope.as_str().to_string(),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            role,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Short-lived access token carrying the user's role
    pub fn issue_access(&self, user_id: i64, role: Role) -> AuthResult<IssuedToken> {
        self.sign(
            &user_id.to_string(),
            Some(role),
            self.access_ttl,
            TokenScope::Access,
        )
    }

    /// Long-lived refresh token
    pub fn issue_refresh(&self, user_id: i64) -> AuthResult<IssuedToken> {
        self.sign(&user_id.to_string(), None, self.refresh_ttl, TokenScope::Refresh)
    }

    /// Decode and validate a token.
    ///
    /// Signature, structure, expiry, issuer and audience failures are all
    /// reported as `InvalidToken`; a well-formed token of the wrong kind
    /// is `InvalidScope`.
    pub fn verify(&self, token: &str, expected: TokenScope) -> AuthResult<JwtClaims> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(reason = %e, "token rejected");
            AuthError::InvalidToken
        })?;

        if data.claims.scope != expected.as_str() {
            return Err(AuthError::InvalidScope);
        }

        Ok(data.claims)
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

fn ttl_minutes(field: &str, minutes: i64) -> AuthResult<Duration> {
    if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) {
        return Err(AuthError::Config(format!(
            "{}: {} is not a usable lifetime",
            field, minutes
        )));
    }
    Duration::try_minutes(minutes)
        .ok_or_else(|| AuthError::Config(format!("{}: {} is not a usable lifetime", field, minutes)))
}
