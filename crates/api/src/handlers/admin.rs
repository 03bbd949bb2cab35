//! Admin-only handlers: force cleanup, cleanup-time settings, and the
//! visibility-loss cascade hook for the group/permission layer.

use axum::extract::{Path, State};
use axum::Json;
use labrack_core::types::DbId;
use labrack_core::{identity, settings};
use labrack_db::models::settings::SystemSettings;
use labrack_db::repositories::SettingsRepo;
use serde::Deserialize;

use crate::engine::{ReclaimSummary, VisibilityCascade};
use crate::error::AppResult;
use crate::middleware::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for `PUT /admin/settings`.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    /// Daily cleanup time, `"HH:MM"`.
    pub cleanup_time: String,
}

/// Body for `POST /admin/devices/{id}/visibility-loss`.
#[derive(Debug, Deserialize)]
pub struct VisibilityLossRequest {
    pub identities: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /admin/force-cleanup
///
/// Clears every device, including unexpired long-term holds.
pub async fn force_cleanup(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
) -> AppResult<Json<DataResponse<ReclaimSummary>>> {
    let summary = state.engine.force_reclaim_all(true, &actor.identity).await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
    RequireAdmin(_actor): RequireAdmin,
) -> AppResult<Json<DataResponse<SystemSettings>>> {
    let settings = SettingsRepo::get_or_create(&state.pool).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// PUT /admin/settings
///
/// Persists the new cleanup time and reschedules the running daily job
/// without a restart.
pub async fn update_settings(
    State(state): State<AppState>,
    RequireAdmin(_actor): RequireAdmin,
    Json(input): Json<UpdateSettingsRequest>,
) -> AppResult<Json<DataResponse<SystemSettings>>> {
    let (hour, minute) = settings::parse_cleanup_time(&input.cleanup_time)?;

    let updated = SettingsRepo::update_cleanup_time(&state.pool, &input.cleanup_time).await?;

    if state.cleanup_schedule.send((hour, minute)).is_err() {
        // The cleanup task is gone; the setting is saved and will apply
        // on next startup.
        tracing::warn!("Daily cleanup job is not running; schedule change saved only");
    }

    Ok(Json(DataResponse { data: updated }))
}

/// POST /admin/devices/{id}/visibility-loss
///
/// Cascade for identities that lost visibility into a device: their
/// share requests and queue slots are removed, and a holder among them
/// has the device released on their behalf.
pub async fn visibility_loss(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    Path(device_id): Path<DbId>,
    Json(input): Json<VisibilityLossRequest>,
) -> AppResult<Json<DataResponse<VisibilityCascade>>> {
    let mut identities = Vec::with_capacity(input.identities.len());
    for raw in &input.identities {
        identities.push(identity::normalize(raw)?);
    }

    let cascade = state
        .engine
        .visibility_loss(device_id, &identities, &actor.identity)
        .await?;
    Ok(Json(DataResponse { data: cascade }))
}
