//! Authentication Module
//!
//! Credentials, access tokens and the per-user session state every protected
//! route consults.
//!
//! # Architecture
//!
//! - **`tokens`** - HS256 JWT issue and verify
//! - **`sessions`** - login, session validation, heartbeat, password reset
//! - **`handlers`** - HTTP handlers for the auth endpoints
//!
//! # Security
//!
//! - Passwords are hashed with bcrypt
//! - One active session per user: each login rotates the stored token version
//! - Sessions without a heartbeat inside the idle timeout are rejected
//! - Unknown email and wrong password return the same 401

/// JWT generation and validation
pub mod tokens;

/// Session state and credential checks
pub mod sessions;

/// HTTP handlers for authentication endpoints
pub mod handlers;

pub use handlers::{heartbeat, login, reset_password, validate_token};
pub use sessions::{check_session, hash_password, LoginOutcome, SessionCheck, SessionService};
pub use tokens::{Claims, TokenKeys};
