//! MedWatch HTTP trigger surface.
//!
//! Exposes config, state, error handling and routes so integration tests and
//! the binary entrypoint build the same router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
