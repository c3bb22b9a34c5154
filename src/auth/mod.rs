//! # Auth Module
//!
//! Credential hashing, token codec, verification codes, the refresh token
//! whitelist/blacklist and the session manager on top of them.

pub mod crypto;
pub mod email;
pub mod errors;
pub mod jwt;
pub mod refresh_token;
pub mod session;
pub mod user;
pub mod verify_code;

pub use crypto::CredentialHasher;
pub use email::{EmailSender, EmailTemplate, EmailWorker, MailTransport, QueuedEmailSender};
pub use errors::{AuthError, AuthResult};
pub use jwt::{IssuedToken, JwtClaims, JwtManager, TokenScope};
pub use refresh_token::{RefreshTokenRecord, TokenList};
pub use session::{SessionManager, SignupRequest, TokenPair};
pub use user::{Role, User, UserStatus};
pub use verify_code::VerifyCode;
