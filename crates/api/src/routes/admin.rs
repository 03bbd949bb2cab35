//! Route definitions for the admin surface.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`. All require the admin role (enforced by
/// handler extractors).
///
/// ```text
/// POST /force-cleanup                  -> force_cleanup
/// GET  /settings                       -> get_settings
/// PUT  /settings                       -> update_settings (reschedules)
/// POST /devices/{id}/visibility-loss   -> visibility_loss
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/force-cleanup", post(admin::force_cleanup))
        .route(
            "/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route(
            "/devices/{id}/visibility-loss",
            post(admin::visibility_loss),
        )
}
