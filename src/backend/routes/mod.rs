//! Route Configuration Module
//!
//! - **`router`** - Main router creation, layers and fallback
//! - **`api_routes`** - `/api/v1` endpoints and their auth middleware
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation
//! └── api_routes.rs   - API endpoints
//! ```
//!
//! # Authentication Layers
//!
//! - Login, token validation and password reset are public
//! - Heartbeat checks the token version but not the idle timeout
//! - Every other API route runs the full session check
//! - `/ws` authenticates through its `token` query parameter and otherwise
//!   connects anonymously

/// Main router creation
pub mod router;

/// API endpoint routes
pub mod api_routes;

pub use router::{create_router, API_PREFIX};
