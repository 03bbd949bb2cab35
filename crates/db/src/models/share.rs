//! Share request entity model and DTOs.

use labrack_core::error::CoreError;
use labrack_core::sharing::ShareStatus;
use labrack_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `share_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShareRequest {
    pub id: DbId,
    pub device_id: DbId,
    pub requester: String,
    pub status: String,
    pub message: Option<String>,
    pub decided_by: Option<String>,
    pub decided_at: Option<Timestamp>,
    pub decision_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ShareRequest {
    /// Parse the stored status into the closed enum.
    pub fn share_status(&self) -> Result<ShareStatus, CoreError> {
        ShareStatus::parse(&self.status)
    }
}

/// DTO for opening a new share request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateShareRequest {
    pub device_id: DbId,
    pub requester: String,
    pub message: Option<String>,
}
