//! HTTP API for test plan sync

pub mod handlers;
pub mod routes;

pub use routes::create_router;
