//! Inventory WS - Main Library
//!
//! Backend core for an internal inventory and operations service: product
//! stock with an append-only transaction ledger, user shift schedules, and
//! real-time push of every change to connected WebSocket clients.
//!
//! # Module Structure
//!
//! - **`shared`** - Types with no I/O
//!   - Domain models and wire events
//!   - Interval algebra for (overnight) shift ranges
//!   - Configuration and shared error types
//!
//! - **`backend`** - The Axum server
//!   - Connection hub (single-task WebSocket fan-out)
//!   - Stock ledger (row-locked stock mutation + ledger entry in one unit of work)
//!   - Shift scheduler (overlap-checked assignments, targeted notifications)
//!   - Session state (rotating token version, idle timeout, heartbeat)
//!   - Persistence traits with Postgres and in-memory implementations
//!
//! # Usage
//!
//! ```rust,no_run
//! use inventory_ws::backend::server::init::create_app;
//! use inventory_ws::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let app = create_app(config).await?;
//! // Serve `app.router` with axum::serve
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! - **Hub**: one task owns the connection registry; everything else talks
//!   to it through a bounded command queue.
//! - **Stock**: writes to one product are serialized by an exclusive row
//!   lock held for the whole unit of work; different products run in
//!   parallel.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
pub mod backend;
