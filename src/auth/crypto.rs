//! # Credential Hashing
//!
//! Argon2id password hashing and random verification codes.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;

use super::errors::{AuthError, AuthResult};

/// Number of digits in an email verification code
pub const VERIFICATION_CODE_DIGITS: u32 = 6;

/// One-way, salted password hasher
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Hasher with the recommended Argon2id parameters
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Hasher with explicit cost parameters.
    ///
    /// `memory_kib` is the memory cost in KiB, `iterations` the time cost.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> AuthResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AuthError::Config(format!("argon2 parameters: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC string. Every call uses a fresh salt.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Check a password against a stored digest.
    ///
    /// A malformed digest is treated as a mismatch.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a six-digit numeric code in 100000..=999999
pub fn generate_verification_code() -> String {
    let low = 10u32.pow(VERIFICATION_CODE_DIGITS - 1);
    let high = 10u32.pow(VERIFICATION_CODE_DIGITS) - 1;
    rand::thread_rng().gen_range(low..=high).to_string()
}
