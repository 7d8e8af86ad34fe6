//! Shared Module
//!
//! Transport-agnostic types used by every backend component: domain models,
//! the wire events pushed over WebSocket, the interval algebra behind shift
//! conflict detection, shared validation errors and application
//! configuration. Nothing in here performs I/O.

/// Domain records and request/response shapes
pub mod models;

/// Real-time event system
pub mod event;

/// Shared error types
pub mod error;

/// Clock-time and date range arithmetic
pub mod schedule;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SharedError;
pub use event::RealtimeEvent;
pub use schedule::{ClockTime, DateSpan, TimeRange};
