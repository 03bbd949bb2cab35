//! Usage history entity model and DTO.

use labrack_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `usage_history` table: one hold, opened on acquisition
/// and closed with a duration when the hold ends.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsageHistoryEntry {
    pub id: DbId,
    pub device_id: DbId,
    pub holder: String,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub duration_minutes: Option<i32>,
    pub purpose: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for opening a history entry.
#[derive(Debug, Clone)]
pub struct OpenUsageHistory {
    pub device_id: DbId,
    pub holder: String,
    pub start_time: Timestamp,
    pub purpose: Option<String>,
}
