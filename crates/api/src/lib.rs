//! Dashscore API server library.
//!
//! Exposes config, state, error handling, routes and background tasks so
//! integration tests and the binary entrypoint share them.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
