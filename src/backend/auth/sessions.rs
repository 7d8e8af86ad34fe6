/**
 * Session State
 *
 * Each user has at most one active session. Logging in mints a fresh token
 * version and stores it on the user record, which silently invalidates every
 * token issued before. A token is accepted only while:
 *
 * 1. its signature, expiry and issuer are valid
 * 2. the user still exists and is active
 * 3. its embedded version equals the stored one
 * 4. the last heartbeat is recent enough (no heartbeat yet counts as stale)
 *
 * Heartbeats refresh the last-seen time and announce presence on the hub.
 */

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::tokens::{Claims, TokenKeys};
use crate::backend::error::BackendError;
use crate::backend::realtime::HubHandle;
use crate::backend::store::UserStore;
use crate::shared::models::User;
use crate::shared::{AppConfig, RealtimeEvent};

pub const MIN_PASSWORD_LEN: usize = 6;

/// How much of the session to check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    /// Version, active flag and idle timeout
    Full,
    /// Version and active flag only; used by the heartbeat itself
    VersionOnly,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Validate a loaded user against a token's version at `now`
pub fn check_session(
    user: &User,
    token_version: &str,
    now: DateTime<Utc>,
    idle_timeout: Duration,
    check: SessionCheck,
) -> Result<(), BackendError> {
    if !user.is_active {
        return Err(BackendError::unauthorized("user account is inactive"));
    }
    if user.token_version.is_empty() || user.token_version != token_version {
        return Err(BackendError::session_expired("logged in on another device"));
    }
    if check == SessionCheck::VersionOnly {
        return Ok(());
    }
    match user.last_seen_at {
        Some(last_seen) if now - last_seen <= idle_timeout => Ok(()),
        _ => Err(BackendError::session_expired("inactive for too long")),
    }
}

/// Hash a password with bcrypt's default cost
pub fn hash_password(password: &str) -> Result<String, BackendError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!("[Auth] Password hashing failed: {}", e);
        BackendError::internal("failed to hash password")
    })
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserStore>,
    keys: TokenKeys,
    idle_timeout: Duration,
    hub: HubHandle,
}

impl SessionService {
    pub fn new(users: Arc<dyn UserStore>, keys: TokenKeys, idle_timeout: Duration, hub: HubHandle) -> Self {
        Self {
            users,
            keys,
            idle_timeout,
            hub,
        }
    }

    pub fn from_config(users: Arc<dyn UserStore>, config: &AppConfig, hub: HubHandle) -> Self {
        let idle_timeout = Duration::from_std(config.session_idle_timeout()).unwrap_or_else(|_| Duration::minutes(5));
        Self::new(users, TokenKeys::from_config(config), idle_timeout, hub)
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Verify credentials and start a new session, ending any previous one
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, BackendError> {
        let email = email.trim();
        let Some(mut user) = self.users.find_user_by_email(email).await? else {
            tracing::warn!("[Auth] Login attempt for unknown email {}", email);
            return Err(BackendError::unauthorized("invalid email or password"));
        };

        if !user.is_active {
            tracing::warn!("[Auth] Login attempt for inactive user {}", user.id);
            return Err(BackendError::unauthorized("user account is inactive"));
        }

        let valid = bcrypt::verify(password, &user.password_hash).map_err(|e| {
            tracing::error!("[Auth] Password verification error for {}: {}", user.id, e);
            BackendError::internal("internal server error")
        })?;
        if !valid {
            tracing::warn!("[Auth] Invalid password for user {}", user.id);
            return Err(BackendError::unauthorized("invalid email or password"));
        }

        let now = Utc::now();
        let version = Uuid::new_v4().to_string();
        self.users.start_session(user.id, &version, now).await?;
        user.token_version = version;
        user.last_seen_at = Some(now);

        let token = self.keys.issue(&user, &user.token_version, now)?;
        tracing::info!("[Auth] User {} ({}) logged in", user.id, user.email);
        Ok(LoginOutcome { token, user })
    }

    /// Resolve a bearer token to its user, applying `check`
    pub async fn authenticate(&self, token: &str, check: SessionCheck) -> Result<(Claims, User), BackendError> {
        let claims = self.keys.verify(token)?;
        let user = self
            .users
            .find_user(claims.user_id)
            .await?
            .ok_or_else(|| BackendError::unauthorized("user not found"))?;

        if let Err(err) = check_session(&user, &claims.token_version, Utc::now(), self.idle_timeout, check) {
            tracing::warn!("[Auth] Session rejected for user {}: {}", user.id, err);
            return Err(err);
        }
        Ok((claims, user))
    }

    /// Full validation, as used by protected routes and the validate endpoint
    pub async fn validate_token(&self, token: &str) -> Result<User, BackendError> {
        self.authenticate(token, SessionCheck::Full)
            .await
            .map(|(_, user)| user)
    }

    /// Replace a password after checking the old one. Existing sessions stay valid.
    pub async fn reset_password(&self, email: &str, old_password: &str, new_password: &str) -> Result<(), BackendError> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::validation(
                "new_password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        let user = self
            .users
            .find_user_by_email(email.trim())
            .await?
            .ok_or_else(|| BackendError::not_found("user"))?;

        let valid = bcrypt::verify(old_password, &user.password_hash).map_err(|e| {
            tracing::error!("[Auth] Password verification error for {}: {}", user.id, e);
            BackendError::internal("internal server error")
        })?;
        if !valid {
            tracing::warn!("[Auth] Password reset with wrong old password for {}", user.id);
            return Err(BackendError::unauthorized("old password is incorrect"));
        }

        let hash = hash_password(new_password)?;
        self.users.update_password(user.id, &hash).await?;
        tracing::info!("[Auth] Password updated for user {}", user.id);
        Ok(())
    }

    /// Record activity and announce the user as online
    pub async fn heartbeat(&self, user_id: Uuid) -> Result<DateTime<Utc>, BackendError> {
        let now = Utc::now();
        self.users.touch_last_seen(user_id, now).await?;
        self.hub.broadcast(&RealtimeEvent::user_online(user_id, now));
        tracing::debug!("[Auth] Heartbeat from user {}", user_id);
        Ok(now)
    }
}
