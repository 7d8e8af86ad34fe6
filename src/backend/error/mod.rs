//! Backend Error Module
//!
//! Error types returned by services and handlers, and their conversion to
//! HTTP responses.
//!
//! - **`types`** - `BackendError`, its `ErrorKind` taxonomy and shift rule rejections
//! - **`conversion`** - `IntoResponse` rendering as JSON

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::{BackendError, ErrorKind, ShiftRejection};
