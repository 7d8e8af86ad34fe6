//! Authentication Handlers Module
//!
//! HTTP handlers for the `/api/v1/auth` endpoints.
//!
//! # Handlers
//!
//! - **`login`** - POST /auth/login
//! - **`validate_token`** - POST /auth/validate-token
//! - **`heartbeat`** - POST /auth/heartbeat (authenticated)
//! - **`reset_password`** - POST /auth/reset-password
//!
//! # Session Flow
//!
//! 1. **Login**: credentials verified → new token version stored → JWT returned
//! 2. **Heartbeat**: sent by the client while it is open → last-seen refreshed
//! 3. **Any other request**: rejected once the last heartbeat is older than the
//!    idle timeout, or once the user logged in somewhere else

/// Request and response types
pub mod types;

/// Login handler
pub mod login;

/// Validate, heartbeat and password handlers
pub mod session;

pub use types::{LoginRequest, LoginResponse, ValidateTokenRequest, ValidateTokenResponse};

pub use login::login;
pub use session::{heartbeat, reset_password, validate_token};
