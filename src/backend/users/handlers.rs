/**
 * User Handlers
 *
 * - GET    /users                    (any logged-in user)
 * - POST   /users                    (user:create)
 * - GET    /users/{id}               (any logged-in user)
 * - PUT    /users/{id}               (user:update)
 * - DELETE /users/{id}               (user:delete)
 * - PUT    /users/{id}/privileges    (user:update_privilege)
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::service::UserService;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::response::{parse_id, DataResponse, MessageResponse};
use crate::shared::models::{privileges, CreateUserRequest, PrivilegesRequest, UpdateUserRequest, UserProfile};

pub async fn list_users(
    State(service): State<UserService>,
    AuthUser(_user): AuthUser,
) -> Result<Json<DataResponse<Vec<UserProfile>>>, BackendError> {
    let users = service.list_users().await?;
    Ok(Json(DataResponse::new("Users retrieved successfully", users)))
}

pub async fn get_user(
    State(service): State<UserService>,
    AuthUser(_user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<UserProfile>>, BackendError> {
    let id = parse_id(&id, "user_id")?;
    let user = service.get_user(id).await?;
    Ok(Json(DataResponse::new("User retrieved successfully", user)))
}

pub async fn create_user(
    State(service): State<UserService>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<DataResponse<UserProfile>>), BackendError> {
    user.require_privilege(privileges::USER_CREATE)?;
    let created = service.create_user(request, &user.actor()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new("User created successfully", created))))
}

pub async fn update_user(
    State(service): State<UserService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<DataResponse<UserProfile>>, BackendError> {
    user.require_privilege(privileges::USER_UPDATE)?;
    let id = parse_id(&id, "user_id")?;
    let updated = service.update_user(id, request, &user.actor()).await?;
    Ok(Json(DataResponse::new("User updated successfully", updated)))
}

pub async fn delete_user(
    State(service): State<UserService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, BackendError> {
    user.require_privilege(privileges::USER_DELETE)?;
    let id = parse_id(&id, "user_id")?;
    service.delete_user(id, &user.actor()).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

pub async fn update_privileges(
    State(service): State<UserService>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<PrivilegesRequest>,
) -> Result<Json<DataResponse<UserProfile>>, BackendError> {
    user.require_privilege(privileges::USER_UPDATE_PRIVILEGE)?;
    let id = parse_id(&id, "user_id")?;
    let updated = service.update_privileges(id, request, &user.actor()).await?;
    Ok(Json(DataResponse::new("Privileges updated successfully", updated)))
}
