//! System settings entity model.

use labrack_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// The singleton row from the `system_settings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SystemSettings {
    pub id: DbId,
    /// Daily cleanup wall-clock time, `"HH:MM"`.
    pub cleanup_time: String,
    pub updated_at: Timestamp,
}
