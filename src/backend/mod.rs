//! Backend Module
//!
//! All server-side code: an Axum HTTP API under `/api/v1` plus a push-only
//! WebSocket at `/ws`.
//!
//! # Architecture
//!
//! - **`server`** - Service wiring, application state, database loading
//! - **`routes`** - Route configuration and router assembly
//! - **`realtime`** - Connection hub and the WebSocket endpoint
//! - **`inventory`** - Products, the stock ledger and financial stats
//! - **`shifts`** - Shift scheduling and conflict detection
//! - **`users`** - Account administration and privileges
//! - **`auth`** - Login, JWT, session version and idle timeout
//! - **`middleware`** - Request authentication and the `AuthUser` extractor
//! - **`store`** - Persistence traits, Postgres and in-memory stores
//! - **`error`** - `BackendError` and its HTTP mapping
//! - **`response`** - Success envelopes and path parsing
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── realtime/       - Hub and WebSocket
//! ├── inventory/      - Stock ledger and handlers
//! ├── shifts/         - Scheduler and handlers
//! ├── users/          - User service and handlers
//! ├── auth/           - Sessions and tokens
//! ├── middleware/     - Request middleware
//! ├── store/          - Persistence
//! ├── error/          - Error types
//! └── response.rs     - Response helpers
//! ```
//!
//! # Real-time Updates
//!
//! Services publish [`crate::shared::RealtimeEvent`]s to the hub after their
//! writes commit. Stock and product events go to every connection; shift
//! events go only to the connections of the affected users.
//!
//! # Error Handling
//!
//! Handlers return `Result<_, BackendError>`; the error renders itself as a
//! JSON body with a matching status code.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Connection hub and WebSocket endpoint
pub mod realtime;

/// Backend error types
pub mod error;

/// Authentication and session state
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Persistence
pub mod store;

/// Products and the stock ledger
pub mod inventory;

/// Shift scheduling
pub mod shifts;

/// User administration
pub mod users;

/// Response helpers
pub mod response;

pub use error::BackendError;
pub use server::create_app;
