/**
 * Access Tokens
 *
 * HS256 JWTs carrying the user's identity, privileges and the token version
 * that was current when the token was issued. A token is only as good as
 * that version: `SessionService` rejects it once a newer login rotated it.
 */

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::shared::models::User;
use crate::shared::AppConfig;

/// Value of the `iss` claim
pub const ISSUER: &str = "inventory-ws";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role_code: String,
    #[serde(default)]
    pub privileges: Vec<String>,
    pub token_version: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

/// Signing and verification keys plus token lifetime
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(i64::try_from(ttl_hours).unwrap_or(24)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_hours)
    }

    /// Issue a token for `user` bound to `token_version`
    pub fn issue(&self, user: &User, token_version: &str, now: DateTime<Utc>) -> Result<String, BackendError> {
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            name: user.full_name.clone(),
            role_code: user.role_code.clone().unwrap_or_default(),
            privileges: user.privileges.clone(),
            token_version: token_version.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!("[Auth] Failed to sign token: {}", e);
            BackendError::internal("failed to generate token")
        })
    }

    /// Check signature, expiry and issuer
    pub fn verify(&self, token: &str) -> Result<Claims, BackendError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("[Auth] Token rejected: {}", e);
                BackendError::unauthorized("invalid or expired token")
            })
    }
}
