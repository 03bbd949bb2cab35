//! Usage record entity model and its mapping to the core state machine.

use labrack_core::error::CoreError;
use labrack_core::status::DeviceStatus;
use labrack_core::types::{DbId, Timestamp};
use labrack_core::usage::UsageState;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `device_usage` table. One per device, created lazily.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsageRecord {
    pub id: DbId,
    pub device_id: DbId,
    pub status: String,
    pub current_holder: Option<String>,
    pub start_time: Option<Timestamp>,
    pub expected_minutes: i32,
    pub is_long_term: bool,
    pub long_term_end: Option<Timestamp>,
    pub long_term_purpose: Option<String>,
    pub queue_users: Vec<String>,
    pub updated_at: Timestamp,
}

impl UsageRecord {
    /// Parse the row into the in-memory state machine image.
    ///
    /// Fails on an unknown status string so a corrupt row surfaces at
    /// the boundary instead of inside a transition.
    pub fn to_state(&self) -> Result<UsageState, CoreError> {
        Ok(UsageState {
            status: DeviceStatus::parse(&self.status)?,
            holder: self.current_holder.clone(),
            start_time: self.start_time,
            expected_minutes: self.expected_minutes,
            is_long_term: self.is_long_term,
            long_term_end: self.long_term_end,
            long_term_purpose: self.long_term_purpose.clone(),
            queue: self.queue_users.clone(),
        })
    }
}
