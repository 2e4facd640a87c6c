//! usy-daemon library target.
//!
//! Exposes the router, state and chat commands for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod commands;
pub mod routes;
pub mod state;
