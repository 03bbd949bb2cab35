//! Route definitions, one module per handler family.

pub mod admin;
pub mod devices;
pub mod health;
pub mod sharing;

use axum::Router;

use crate::state::AppState;

/// All `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/devices", devices::router())
        .nest("/shares", sharing::router())
        .nest("/admin", admin::router())
}
