//! Shifts Module
//!
//! Shift assignment with overnight-aware conflict detection.
//!
//! - **`scheduler`** - [`ShiftScheduler`], validation, conflicts and notifications
//! - **`handlers`** - HTTP handlers for `/shifts`

pub mod scheduler;

pub mod handlers;

pub use scheduler::{ShiftScheduler, Viewer};
