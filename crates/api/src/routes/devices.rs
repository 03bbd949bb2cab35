//! Route definitions for the device catalog and occupancy operations.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{devices, sharing};
use crate::state::AppState;

/// Routes mounted at `/devices`.
///
/// ```text
/// GET    /                    -> list_devices
/// POST   /                    -> create_device (admin)
/// GET    /connectivity        -> connectivity_batch
/// GET    /{id}                -> get_device
/// GET    /{id}/usage          -> get_usage
/// GET    /{id}/history        -> get_history
/// GET    /{id}/access         -> get_access_entries
/// GET    /{id}/connectivity   -> device_connectivity
/// POST   /{id}/use            -> use_device (long_term_end => long-term)
/// POST   /{id}/release        -> release_device
/// POST   /{id}/preempt        -> preempt_device
/// POST   /{id}/queue          -> join_queue (priority flag for admins)
/// DELETE /{id}/queue          -> leave_queue
/// POST   /{id}/shares         -> request_share
/// GET    /{id}/shares         -> list_shares
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(devices::list_devices).post(devices::create_device))
        .route("/connectivity", get(devices::connectivity_batch))
        .route("/{id}", get(devices::get_device))
        .route("/{id}/usage", get(devices::get_usage))
        .route("/{id}/history", get(devices::get_history))
        .route("/{id}/access", get(devices::get_access_entries))
        .route("/{id}/connectivity", get(devices::device_connectivity))
        .route("/{id}/use", post(devices::use_device))
        .route("/{id}/release", post(devices::release_device))
        .route("/{id}/preempt", post(devices::preempt_device))
        .route(
            "/{id}/queue",
            post(devices::join_queue).delete(devices::leave_queue),
        )
        .route(
            "/{id}/shares",
            post(sharing::request_share).get(sharing::list_shares),
        )
}
