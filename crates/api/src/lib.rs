//! labrack API server library.
//!
//! Exposes the building blocks (config, state, error handling, engine,
//! routes, background jobs) so the binary entrypoint and any future
//! tooling can access them.

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
