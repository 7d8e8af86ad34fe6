/**
 * Authentication Middleware
 *
 * Protects routes that require a logged-in user. The bearer token from the
 * Authorization header is resolved through [`SessionService`] and the
 * resulting [`AuthenticatedUser`] is attached to the request extensions,
 * where handlers pick it up with the [`AuthUser`] extractor.
 *
 * Privileges are taken from the stored user, not from the token, so a
 * revoked privilege takes effect on the next request.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::backend::auth::sessions::{SessionCheck, SessionService};
use crate::backend::error::BackendError;
use crate::shared::event::ActorInfo;
use crate::shared::models::User;

/// Authenticated user data resolved from the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub privileges: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_privilege(&self, code: &str) -> bool {
        self.privileges.iter().any(|p| p == code)
    }

    /// Reject with `Forbidden` unless the user holds `code`
    pub fn require_privilege(&self, code: &str) -> Result<(), BackendError> {
        if self.has_privilege(code) {
            return Ok(());
        }
        tracing::warn!("[Auth] User {} lacks privilege '{}'", self.user_id, code);
        Err(BackendError::forbidden(format!(
            "Forbidden: requires '{}' privilege",
            code
        )))
    }

    /// Identity attached to realtime events
    pub fn actor(&self) -> ActorInfo {
        ActorInfo {
            id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.full_name.clone(),
            privileges: user.privileges.clone(),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, BackendError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| BackendError::unauthorized("Missing authorization token"))?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme == "Bearer" && !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(BackendError::unauthorized(
            "Invalid authorization format. Use: Bearer <token>",
        )),
    }
}

async fn authenticate_request(
    sessions: &SessionService,
    mut request: Request,
    next: Next,
    check: SessionCheck,
) -> Result<Response, BackendError> {
    let token = bearer_token(request.headers())?;
    let (_, user) = sessions.authenticate(token, check).await?;
    request.extensions_mut().insert(AuthenticatedUser::from(&user));
    Ok(next.run(request).await)
}

/// Full session validation: version, active flag and idle timeout
pub async fn require_auth(
    State(sessions): State<SessionService>,
    request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    authenticate_request(&sessions, request, next, SessionCheck::Full).await
}

/// Version and active flag only. Mounted on the heartbeat route, which is
/// what keeps an otherwise idle session alive.
pub async fn require_session_version(
    State(sessions): State<SessionService>,
    request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    authenticate_request(&sessions, request, next, SessionCheck::VersionOnly).await
}

/// Axum extractor for the user attached by the middleware
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                tracing::warn!("[Auth] AuthenticatedUser not found in request extensions");
                BackendError::unauthorized("Unauthorized")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::error::ErrorKind;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn test_missing_header() {
        let err = bearer_token(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "Missing authorization token");
    }

    #[test]
    fn test_wrong_scheme() {
        let err = bearer_token(&headers("Basic abc")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid authorization format. Use: Bearer <token>");
        assert!(bearer_token(&headers("Bearer")).is_err());
    }

    #[test]
    fn test_require_privilege() {
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            privileges: vec!["product:create".to_string()],
        };
        assert!(user.require_privilege("product:create").is_ok());

        let err = user.require_privilege("shift:delete").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.to_string(), "Forbidden: requires 'shift:delete' privilege");
    }
}
