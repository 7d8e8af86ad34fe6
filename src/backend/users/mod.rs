//! Users Module
//!
//! Account administration: create, edit, deactivate, delete and grant
//! privileges.
//!
//! - **`service`** - [`UserService`], hashing, uniqueness and soft delete
//! - **`handlers`** - HTTP handlers for `/users`

pub mod service;

pub mod handlers;

pub use service::UserService;
