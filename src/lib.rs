//! brewauth - account signup, email verification and token sessions
//!
//! The [`auth`] module holds the stores and the [`auth::SessionManager`]
//! that drives them; [`service::AuthService`] wires everything together
//! with the mail worker and the unverified-user sweeper.

pub mod auth;
pub mod cli;
pub mod config;
pub mod config_validator;
pub mod db;
pub mod logging;
pub mod service;
pub mod sweeper;

pub use auth::{AuthError, AuthResult, SessionManager};
pub use config::AppConfig;
pub use service::AuthService;
