/**
 * Error Conversion
 *
 * `IntoResponse` for `BackendError`, so handlers can return it directly.
 *
 * # Response Format
 *
 * ```json
 * {
 *   "error": "insufficient stock remaining: requested 5, available 2",
 *   "kind": "Conflict",
 *   "status": 409
 * }
 * ```
 *
 * Shift conflicts add `"conflicts"` with the colliding time and date ranges,
 * and shift rule rejections add a machine-readable `"reason"`.
 */

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut body = serde_json::json!({
            "error": self.message(),
            "kind": self.kind().as_str(),
            "status": status.as_u16(),
        });

        match &self {
            BackendError::ShiftConflict { conflicts } => {
                body["conflicts"] = serde_json::to_value(conflicts).unwrap_or_default();
            }
            BackendError::ShiftRejected(reason) => {
                body["reason"] = serde_json::Value::from(reason.code());
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
