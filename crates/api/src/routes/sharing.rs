//! Route definitions for share request decisions.

use axum::routing::post;
use axum::Router;

use crate::handlers::sharing;
use crate::state::AppState;

/// Routes mounted at `/shares`.
///
/// ```text
/// POST /{id}/decision -> decide_share (holder)
/// POST /{id}/revoke   -> revoke_share (holder or admin)
/// POST /{id}/cancel   -> cancel_share (requester)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/decision", post(sharing::decide_share))
        .route("/{id}/revoke", post(sharing::revoke_share))
        .route("/{id}/cancel", post(sharing::cancel_share))
}
