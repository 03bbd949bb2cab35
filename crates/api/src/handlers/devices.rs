//! Handlers for the device catalog and occupancy operations.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use labrack_connectivity::ConnectivityStatus;
use labrack_core::error::CoreError;
use labrack_core::status::DeviceStatus;
use labrack_core::types::{DbId, Timestamp};
use labrack_db::models::access::AccessEntry;
use labrack_db::models::device::{CreateDevice, Device};
use labrack_db::models::history::UsageHistoryEntry;
use labrack_db::repositories::{AccessEntryRepo, DeviceRepo, UsageHistoryRepo, UsageRepo};
use serde::{Deserialize, Serialize};

use crate::engine::{QueuePayload, UsagePayload};
use crate::error::{AppError, AppResult};
use crate::middleware::{Actor, RequireAdmin};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /devices/{id}/use`.
///
/// Providing `long_term_end` turns the occupation into a long-term hold.
#[derive(Debug, Deserialize)]
pub struct UseDeviceRequest {
    pub expected_minutes: Option<i32>,
    pub long_term_end: Option<Timestamp>,
    pub purpose: Option<String>,
}

/// Body for `POST /devices/{id}/preempt`.
#[derive(Debug, Deserialize)]
pub struct PreemptRequest {
    pub expected_minutes: Option<i32>,
    pub purpose: Option<String>,
}

/// Body for `POST /devices/{id}/queue`.
#[derive(Debug, Default, Deserialize)]
pub struct QueueRequest {
    /// Insert at the head instead of the tail (elevated actors only).
    #[serde(default)]
    pub priority: bool,
}

/// Query for `GET /devices/connectivity?ids=1,2,3`.
#[derive(Debug, Deserialize)]
pub struct ConnectivityBatchQuery {
    pub ids: String,
}

/// One row of the device list: catalog fields plus a usage summary and
/// the last persisted reachability verdict.
#[derive(Debug, Serialize)]
pub struct DeviceListItem {
    pub id: DbId,
    pub name: String,
    pub ip_address: String,
    pub device_type: String,
    pub owner: String,
    pub support_queue: bool,
    pub status: DeviceStatus,
    pub holder: Option<String>,
    pub queue_count: usize,
    pub occupied_minutes: i64,
    pub reachable: bool,
    pub last_check_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Catalog handlers
// ---------------------------------------------------------------------------

/// GET /devices
///
/// All devices with their usage summary. Reachability comes from the
/// persisted columns, not the live cache, so listing does not enroll
/// every device into active polling.
pub async fn list_devices(
    State(state): State<AppState>,
    _actor: Actor,
) -> AppResult<Json<DataResponse<Vec<DeviceListItem>>>> {
    let devices = DeviceRepo::list(&state.pool).await?;
    let now = Utc::now();

    let mut items = Vec::with_capacity(devices.len());
    for device in devices {
        let record = UsageRepo::find_or_create(&state.pool, device.id).await?;
        let usage = record.to_state()?;
        items.push(DeviceListItem {
            id: device.id,
            name: device.name,
            ip_address: device.ip_address,
            device_type: device.device_type,
            owner: device.owner,
            support_queue: device.support_queue,
            status: usage.status,
            holder: usage.holder.clone(),
            queue_count: usage.queue.len(),
            occupied_minutes: usage.occupied_minutes(now),
            reachable: device.reachable,
            last_check_at: device.last_check_at,
        });
    }

    Ok(Json(DataResponse { data: items }))
}

/// POST /devices
pub async fn create_device(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    Json(input): Json<CreateDevice>,
) -> AppResult<(StatusCode, Json<DataResponse<Device>>)> {
    if input.name.trim().is_empty() {
        return Err(CoreError::Validation("Device name is required".to_string()).into());
    }
    if input.ip_address.trim().is_empty() {
        return Err(CoreError::Validation("Device address is required".to_string()).into());
    }
    if input.max_occupancy_minutes.is_some_and(|m| m <= 0) {
        return Err(
            CoreError::Validation("max_occupancy_minutes must be positive".to_string()).into(),
        );
    }

    let device = DeviceRepo::create(&state.pool, &input, &actor.identity).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: device })))
}

/// GET /devices/{id}
pub async fn get_device(
    State(state): State<AppState>,
    _actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Device>>> {
    let device = DeviceRepo::find_by_id(&state.pool, device_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "device",
            id: device_id,
        })?;
    Ok(Json(DataResponse { data: device }))
}

/// GET /devices/{id}/usage
pub async fn get_usage(
    State(state): State<AppState>,
    _actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<UsagePayload>>> {
    let payload = state.engine.usage_view(device_id).await?;
    Ok(Json(DataResponse { data: payload }))
}

// ---------------------------------------------------------------------------
// Occupancy handlers
// ---------------------------------------------------------------------------

/// POST /devices/{id}/use
pub async fn use_device(
    State(state): State<AppState>,
    actor: Actor,
    Path(device_id): Path<DbId>,
    Json(input): Json<UseDeviceRequest>,
) -> AppResult<Json<DataResponse<UsagePayload>>> {
    let payload = match input.long_term_end {
        Some(end) => {
            state
                .engine
                .long_term_use(device_id, &actor.identity, end, input.purpose)
                .await?
        }
        None => {
            state
                .engine
                .use_device(device_id, &actor.identity, input.expected_minutes, input.purpose)
                .await?
        }
    };
    Ok(Json(DataResponse { data: payload }))
}

/// POST /devices/{id}/release
pub async fn release_device(
    State(state): State<AppState>,
    actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<UsagePayload>>> {
    let payload = state
        .engine
        .release(device_id, &actor.identity, actor.elevated)
        .await?;
    Ok(Json(DataResponse { data: payload }))
}

/// POST /devices/{id}/preempt
pub async fn preempt_device(
    State(state): State<AppState>,
    actor: Actor,
    Path(device_id): Path<DbId>,
    Json(input): Json<PreemptRequest>,
) -> AppResult<Json<DataResponse<UsagePayload>>> {
    let payload = state
        .engine
        .preempt(device_id, &actor.identity, input.expected_minutes, input.purpose)
        .await?;
    Ok(Json(DataResponse { data: payload }))
}

/// POST /devices/{id}/queue
pub async fn join_queue(
    State(state): State<AppState>,
    actor: Actor,
    Path(device_id): Path<DbId>,
    Json(input): Json<QueueRequest>,
) -> AppResult<Json<DataResponse<QueuePayload>>> {
    let payload = state
        .engine
        .enqueue(device_id, &actor.identity, input.priority, actor.elevated)
        .await?;
    Ok(Json(DataResponse { data: payload }))
}

/// DELETE /devices/{id}/queue
pub async fn leave_queue(
    State(state): State<AppState>,
    actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<UsagePayload>>> {
    let payload = state.engine.cancel_queue(device_id, &actor.identity).await?;
    Ok(Json(DataResponse { data: payload }))
}

// ---------------------------------------------------------------------------
// Bookkeeping handlers
// ---------------------------------------------------------------------------

/// Default page size for the history endpoint.
const HISTORY_LIMIT: i64 = 50;

/// GET /devices/{id}/history
///
/// Recent holds, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    _actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<UsageHistoryEntry>>>> {
    DeviceRepo::find_by_id(&state.pool, device_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "device",
            id: device_id,
        })?;
    let entries = UsageHistoryRepo::list_for_device(&state.pool, device_id, HISTORY_LIMIT).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// GET /devices/{id}/access
///
/// Who currently has network access to the device and at what address.
pub async fn get_access_entries(
    State(state): State<AppState>,
    _actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<AccessEntry>>>> {
    DeviceRepo::find_by_id(&state.pool, device_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "device",
            id: device_id,
        })?;
    let entries = AccessEntryRepo::list_for_device(&state.pool, device_id).await?;
    Ok(Json(DataResponse { data: entries }))
}

// ---------------------------------------------------------------------------
// Connectivity handlers
// ---------------------------------------------------------------------------

/// GET /devices/{id}/connectivity
pub async fn device_connectivity(
    State(state): State<AppState>,
    _actor: Actor,
    Path(device_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ConnectivityStatus>>> {
    let device = DeviceRepo::find_by_id(&state.pool, device_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "device",
            id: device_id,
        })?;
    let status = state.connectivity.status(&device).await;
    Ok(Json(DataResponse { data: status }))
}

/// GET /devices/connectivity?ids=1,2,3
pub async fn connectivity_batch(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<ConnectivityBatchQuery>,
) -> AppResult<Json<DataResponse<HashMap<DbId, ConnectivityStatus>>>> {
    let ids = parse_ids(&query.ids)?;
    let devices = DeviceRepo::list_by_ids(&state.pool, &ids).await?;
    let statuses = state.connectivity.status_many(&devices).await;
    Ok(Json(DataResponse { data: statuses }))
}

fn parse_ids(raw: &str) -> Result<Vec<DbId>, AppError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id: DbId = part
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Invalid device id '{part}'")))?;
        ids.push(id);
    }
    if ids.is_empty() {
        return Err(AppError::BadRequest("No device ids provided".to_string()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::parse_ids;

    #[test]
    fn parses_comma_separated_ids() {
        assert_eq!(parse_ids("1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_ids(" 4 , 5 ").unwrap(), vec![4, 5]);
    }

    #[test]
    fn rejects_garbage_and_empty() {
        assert!(parse_ids("1,x").is_err());
        assert!(parse_ids("").is_err());
        assert!(parse_ids(" , ").is_err());
    }
}
