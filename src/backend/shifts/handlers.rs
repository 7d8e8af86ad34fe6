/**
 * Shift Handlers
 *
 * - GET    /shifts?view_type=daily|weekly|monthly|all&reference_date=YYYY-MM-DD
 * - POST   /shifts              (shift:create)
 * - GET    /shifts/{id}
 * - PUT    /shifts/{id}         (shift:update)
 * - DELETE /shifts/{id}         (shift:delete)
 * - GET    /shifts/user/{user_id}
 *
 * Holders of `shift:create` count as admins for reads and see every user's
 * shifts; everyone else sees only their own.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::scheduler::{ShiftScheduler, Viewer};
use crate::backend::error::BackendError;
use crate::backend::middleware::{AuthUser, AuthenticatedUser};
use crate::backend::response::{parse_id, DataResponse, MessageResponse};
use crate::shared::models::{privileges, CreateShiftRequest, ShiftView, UpdateShiftRequest};
use crate::shared::schedule::{parse_date, ViewType, DATE_FORMAT};

fn viewer(user: &AuthenticatedUser) -> Viewer {
    Viewer {
        id: user.user_id,
        is_admin: user.has_privilege(privileges::SHIFT_CREATE),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ShiftListQuery {
    #[serde(default)]
    pub view_type: String,
    #[serde(default)]
    pub reference_date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShiftListResponse {
    pub data: Vec<ShiftView>,
    pub view_type: ViewType,
    pub reference_date: String,
    pub is_admin: bool,
    pub total: usize,
}

pub async fn list_shifts(
    State(scheduler): State<ShiftScheduler>,
    AuthUser(user): AuthUser,
    Query(query): Query<ShiftListQuery>,
) -> Result<Json<ShiftListResponse>, BackendError> {
    let view_type: ViewType = query.view_type.trim().parse()?;
    let reference = match query.reference_date.trim() {
        "" => scheduler.today(),
        raw => parse_date("reference_date", raw)?,
    };
    let viewer = viewer(&user);

    let data = scheduler.list_shifts(viewer, view_type, reference).await?;
    Ok(Json(ShiftListResponse {
        total: data.len(),
        data,
        view_type,
        reference_date: reference.format(DATE_FORMAT).to_string(),
        is_admin: viewer.is_admin,
    }))
}

pub async fn create_shift(
    State(scheduler): State<ShiftScheduler>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateShiftRequest>,
) -> Result<(StatusCode, Json<DataResponse<ShiftView>>), BackendError> {
    user.require_privilege(privileges::SHIFT_CREATE)?;
    let shift = scheduler.create_shift(request, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new("Shift created successfully", shift))))
}

pub async fn get_shift(
    State(scheduler): State<ShiftScheduler>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ShiftView>, BackendError> {
    let id = parse_id(&id, "shift_id")?;
    Ok(Json(scheduler.get_shift(id, viewer(&user)).await?))
}

pub async fn update_shift(
    State(scheduler): State<ShiftScheduler>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateShiftRequest>,
) -> Result<Json<DataResponse<ShiftView>>, BackendError> {
    user.require_privilege(privileges::SHIFT_UPDATE)?;
    let id = parse_id(&id, "shift_id")?;
    let shift = scheduler.update_shift(id, request, user.user_id).await?;
    Ok(Json(DataResponse::new("Shift updated successfully", shift)))
}

pub async fn delete_shift(
    State(scheduler): State<ShiftScheduler>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, BackendError> {
    user.require_privilege(privileges::SHIFT_DELETE)?;
    let id = parse_id(&id, "shift_id")?;
    scheduler.cancel_shift(id, user.user_id).await?;
    Ok(Json(MessageResponse::new("Shift deleted successfully")))
}

pub async fn shifts_by_user(
    State(scheduler): State<ShiftScheduler>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ShiftView>>, BackendError> {
    let user_id = parse_id(&user_id, "user_id")?;
    Ok(Json(scheduler.shifts_for_user(user_id, viewer(&user)).await?))
}
