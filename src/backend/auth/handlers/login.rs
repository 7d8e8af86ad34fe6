/**
 * Login Handler
 *
 * POST /api/v1/auth/login
 *
 * Verifies email and password, starts a new session (ending any previous
 * one for the same user) and returns a token bound to it.
 */

use axum::{extract::State, response::Json};

use crate::backend::auth::handlers::types::{LoginRequest, LoginResponse};
use crate::backend::auth::sessions::SessionService;
use crate::backend::error::BackendError;

/// Login handler
///
/// # Errors
///
/// * `400` - email or password missing
/// * `401` - unknown email, wrong password or inactive account
/// * `500` - store or signing failure
///
/// # Example Request
///
/// ```http
/// POST /api/v1/auth/login HTTP/1.1
/// Content-Type: application/json
///
/// { "email": "admin@example.com", "password": "admin123" }
/// ```
pub async fn login(
    State(sessions): State<SessionService>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, BackendError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(BackendError::validation("credentials", "email and password are required"));
    }

    let outcome = sessions.login(&request.email, &request.password).await?;
    let privileges = outcome.user.privileges.clone();

    Ok(Json(LoginResponse {
        token: outcome.token,
        user: outcome.user.profile(),
        privileges,
    }))
}
