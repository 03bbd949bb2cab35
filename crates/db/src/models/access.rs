//! Derived access entry model.
//!
//! Rows here are bookkeeping: who currently has network access to a
//! device and at what address. They are rebuilt by the engine whenever a
//! holder or share changes, never hand-edited.

use labrack_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Role strings stored in `access_entries.role`.
pub const ROLE_OCCUPANT: &str = "occupant";
pub const ROLE_SHARED: &str = "shared";

/// A row from the `access_entries` table, one per (device, identity).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessEntry {
    pub id: DbId,
    pub device_id: DbId,
    pub identity: String,
    pub role: String,
    pub network_address: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
