//! OAuth consumer registry library crate.
//!
//! Registers third-party OAuth consumers for components: every definition is
//! validated, its secret is encrypted remotely and locally, and only then is the
//! record persisted.

pub mod config;
pub mod consumers;
pub mod errors;
pub mod http;
pub mod storage;
