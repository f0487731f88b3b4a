//! alsync-daemon library target.
//!
//! Exposes the sync service, scheduler transport, router and state for
//! integration tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod routes;
pub mod scheduler_client;
pub mod service;
pub mod state;
