//! Handlers for the co-occupancy (share) workflow.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use labrack_core::types::DbId;
use labrack_db::models::share::ShareRequest;
use serde::Deserialize;

use crate::engine::SharePayload;
use crate::error::AppResult;
use crate::middleware::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for `POST /devices/{id}/shares`.
#[derive(Debug, Default, Deserialize)]
pub struct ShareMessageRequest {
    pub message: Option<String>,
}

/// Body for `POST /shares/{id}/decision`.
#[derive(Debug, Deserialize)]
pub struct ShareDecisionRequest {
    pub approve: bool,
    pub reason: Option<String>,
}

/// Body for `POST /shares/{id}/revoke`.
#[derive(Debug, Default, Deserialize)]
pub struct ShareRevokeRequest {
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /devices/{id}/shares
pub async fn request_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(device_id): Path<DbId>,
    Json(input): Json<ShareMessageRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<SharePayload>>)> {
    let payload = state
        .engine
        .request_share(device_id, &actor.identity, input.message)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: payload })))
}

/// GET /devices/{id}/shares
pub async fn list_shares(
    State(state): State<AppState>,
    _actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<ShareRequest>>>> {
    let requests = state.engine.list_shares(device_id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// POST /shares/{id}/decision
pub async fn decide_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<DbId>,
    Json(input): Json<ShareDecisionRequest>,
) -> AppResult<Json<DataResponse<ShareRequest>>> {
    let request = state
        .engine
        .decide_share(request_id, &actor.identity, input.approve, input.reason)
        .await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /shares/{id}/revoke
pub async fn revoke_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<DbId>,
    Json(input): Json<ShareRevokeRequest>,
) -> AppResult<Json<DataResponse<ShareRequest>>> {
    let request = state
        .engine
        .revoke_share(request_id, &actor.identity, actor.elevated, input.reason)
        .await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /shares/{id}/cancel
pub async fn cancel_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ShareRequest>>> {
    let request = state
        .engine
        .cancel_share(request_id, &actor.identity)
        .await?;
    Ok(Json(DataResponse { data: request }))
}
