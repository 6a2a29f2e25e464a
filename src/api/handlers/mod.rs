//! HTTP request handlers.

pub mod auth_handler;
pub mod user_handler;

pub use auth_handler::{auth_routes, session_routes};
pub use user_handler::{user_routes, widget_routes};
