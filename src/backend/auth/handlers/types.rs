/**
 * Authentication Handler Types
 *
 * Request and response bodies for the `/auth` endpoints.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::models::UserProfile;

/// Login request
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by login. The token embeds the session's version; logging in
/// again anywhere invalidates it.
#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
    pub privileges: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct ValidateTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub user: UserProfile,
    pub privileges: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HeartbeatResponse {
    pub message: String,
    pub status: String,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}
