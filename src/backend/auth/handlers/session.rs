/**
 * Session Handlers
 *
 * - POST /api/v1/auth/validate-token - full session check for a raw token
 * - POST /api/v1/auth/heartbeat - keep the session alive (authenticated)
 * - POST /api/v1/auth/reset-password - change password given the old one
 */

use axum::{extract::State, response::Json};

use crate::backend::auth::handlers::types::{
    HeartbeatResponse, MessageResponse, ResetPasswordRequest, ValidateTokenRequest, ValidateTokenResponse,
};
use crate::backend::auth::sessions::SessionService;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;

pub async fn validate_token(
    State(sessions): State<SessionService>,
    Json(request): Json<ValidateTokenRequest>,
) -> Result<Json<ValidateTokenResponse>, BackendError> {
    if request.token.trim().is_empty() {
        return Err(BackendError::validation("token", "token is required"));
    }

    let user = sessions.validate_token(request.token.trim()).await?;
    Ok(Json(ValidateTokenResponse {
        valid: true,
        privileges: user.privileges.clone(),
        user: user.profile(),
    }))
}

/// Mounted behind `require_session_version`, so an idle but otherwise
/// valid session can revive itself here.
pub async fn heartbeat(
    State(sessions): State<SessionService>,
    AuthUser(user): AuthUser,
) -> Result<Json<HeartbeatResponse>, BackendError> {
    let last_seen_at = sessions.heartbeat(user.user_id).await?;
    Ok(Json(HeartbeatResponse {
        message: "Heartbeat received".to_string(),
        status: "online".to_string(),
        last_seen_at,
    }))
}

pub async fn reset_password(
    State(sessions): State<SessionService>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, BackendError> {
    if request.email.trim().is_empty() || request.old_password.is_empty() || request.new_password.is_empty() {
        return Err(BackendError::validation(
            "credentials",
            "email, old_password, and new_password are required",
        ));
    }

    sessions
        .reset_password(&request.email, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}
