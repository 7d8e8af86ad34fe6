//! Real-time Update Module
//!
//! Pushes JSON events to connected WebSocket clients.
//!
//! # Architecture
//!
//! - **`registry`** - the connection set and its per-user index
//! - **`hub`** - the task that owns the registry, and [`HubHandle`] to reach it
//! - **`socket`** - the `/ws` upgrade handler and per-connection loop
//!
//! # Delivery
//!
//! Services call [`HubHandle::broadcast`] or [`HubHandle::send_to_users`]
//! after their own write committed. Both return immediately. Delivery is
//! best effort: a client that is not connected at that moment misses the
//! event, and a client that cannot keep up is disconnected.
//!
//! # Event Types
//!
//! - `stock_update` - product created or updated, transaction recorded
//! - `financial_update` - financial figures changed, re-fetch them
//! - `shift_notification` - sent only to the users a shift change affects
//! - `user_status_update` - a user sent a heartbeat

pub mod registry;

pub mod hub;

pub mod socket;

pub use hub::{ClientChannel, HubError, HubHandle};
pub use registry::ConnectionId;
pub use socket::ws_handler;
