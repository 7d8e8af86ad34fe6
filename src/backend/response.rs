//! Response envelopes and path parsing shared by the HTTP handlers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::error::BackendError;

/// `{"message": ..., "data": ...}` returned by write endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// `{"message": ...}` for writes with nothing to return
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse a path segment as a UUID, reporting `field` on failure
pub fn parse_id(raw: &str, field: &str) -> Result<Uuid, BackendError> {
    Uuid::parse_str(raw.trim()).map_err(|_| BackendError::validation(field, "is not a valid ID"))
}
