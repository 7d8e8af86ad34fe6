//! Server Module
//!
//! Initialization and configuration of the Axum HTTP server.
//!
//! - **`state`** - `AppState` and its `FromRef` implementations
//! - **`config`** - Database connection and migrations
//! - **`init`** - Service wiring and app creation
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Database loading
//! └── init.rs         - Server initialization and app creation
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Database**: Postgres pool plus migrations, or the in-memory store
//! 2. **Hub**: the connection hub task is spawned
//! 3. **Services**: sessions, stock ledger and shift scheduler share the hub
//! 4. **Seed**: a default administrator is created in an empty user table
//! 5. **Router**: routes and middleware are configured

/// Application state management
pub mod state;

/// Database loading
pub mod config;

/// Server initialization
pub mod init;

pub use init::{create_app, create_app_with_stores, App};
pub use state::AppState;
