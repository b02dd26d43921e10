//! Axum HTTP surface for consumer registration and lookup.

pub mod context;
mod handler_consumers;
pub mod middleware_auth;
pub mod server;

pub use context::AppState;
pub use server::build_router;
