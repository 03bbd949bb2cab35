//! Device catalog entity models and DTOs.

use labrack_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `devices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub id: DbId,
    pub name: String,
    pub ip_address: String,
    pub device_type: String,
    pub owner: String,
    pub creator: String,
    pub support_queue: bool,
    /// Maximum occupancy in minutes before the scheduler may rotate the
    /// device to the next queued holder. `None` disables enforcement.
    pub max_occupancy_minutes: Option<i32>,
    pub remarks: Option<String>,
    /// Last reachability verdict persisted by the connectivity loop.
    pub reachable: bool,
    pub last_probe_at: Option<Timestamp>,
    pub last_check_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a new device.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDevice {
    pub name: String,
    pub ip_address: String,
    pub device_type: Option<String>,
    pub owner: String,
    pub support_queue: Option<bool>,
    pub max_occupancy_minutes: Option<i32>,
    pub remarks: Option<String>,
}
