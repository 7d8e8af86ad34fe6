//! Middleware Module
//!
//! HTTP middleware applied before handlers run.
//!
//! - **`auth`** - bearer token resolution, session checks and the
//!   [`AuthUser`] extractor

pub mod auth;

pub use auth::{bearer_token, require_auth, require_session_version, AuthUser, AuthenticatedUser};
