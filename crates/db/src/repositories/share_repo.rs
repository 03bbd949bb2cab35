//! Repository for the `share_requests` table.
//!
//! State transitions are guarded updates (`WHERE status = <from>`), so
//! two racing decisions on the same request resolve to exactly one
//! winner; the loser observes zero rows and maps that to the
//! already-decided error.

use labrack_core::types::DbId;
use sqlx::PgPool;

use crate::models::share::{CreateShareRequest, ShareRequest};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, device_id, requester, status, message, decided_by, decided_at, \
                       decision_reason, created_at, updated_at";

/// Provides operations on share requests.
pub struct ShareRequestRepo;

impl ShareRequestRepo {
    /// Insert a new pending request, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateShareRequest,
    ) -> Result<ShareRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO share_requests (device_id, requester, message)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ShareRequest>(&query)
            .bind(input.device_id)
            .bind(&input.requester)
            .bind(&input.message)
            .fetch_one(pool)
            .await
    }

    /// Fetch a request by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ShareRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM share_requests WHERE id = $1");
        sqlx::query_as::<_, ShareRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All requests for a device, newest first.
    pub async fn list_for_device(
        pool: &PgPool,
        device_id: DbId,
    ) -> Result<Vec<ShareRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM share_requests WHERE device_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ShareRequest>(&query)
            .bind(device_id)
            .fetch_all(pool)
            .await
    }

    /// The requester's active (pending or approved) request for a
    /// device, if any. At most one exists by unique index.
    pub async fn find_active(
        pool: &PgPool,
        device_id: DbId,
        requester: &str,
    ) -> Result<Option<ShareRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM share_requests
             WHERE device_id = $1 AND requester = $2 AND status IN ('pending', 'approved')"
        );
        sqlx::query_as::<_, ShareRequest>(&query)
            .bind(device_id)
            .bind(requester)
            .fetch_optional(pool)
            .await
    }

    /// All active (pending or approved) requests for a device.
    pub async fn list_active_for_device(
        pool: &PgPool,
        device_id: DbId,
    ) -> Result<Vec<ShareRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM share_requests
             WHERE device_id = $1 AND status IN ('pending', 'approved')
             ORDER BY created_at"
        );
        sqlx::query_as::<_, ShareRequest>(&query)
            .bind(device_id)
            .fetch_all(pool)
            .await
    }

    /// Guarded status transition: applies only if the row is still in
    /// `from_status`. Returns `None` when another actor got there first.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from_status: &str,
        to_status: &str,
        decided_by: &str,
        reason: Option<&str>,
    ) -> Result<Option<ShareRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE share_requests
             SET status = $3, decided_by = $4, decided_at = NOW(), decision_reason = $5,
                 updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ShareRequest>(&query)
            .bind(id)
            .bind(from_status)
            .bind(to_status)
            .bind(decided_by)
            .bind(reason)
            .fetch_optional(pool)
            .await
    }

    /// Revoke every approved request for a device (holder change).
    /// Returns the revoked rows so the engine can notify requesters.
    pub async fn revoke_all_approved(
        pool: &PgPool,
        device_id: DbId,
        actor: &str,
        reason: &str,
    ) -> Result<Vec<ShareRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE share_requests
             SET status = 'revoked', decided_by = $2, decided_at = NOW(),
                 decision_reason = $3, updated_at = NOW()
             WHERE device_id = $1 AND status = 'approved'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ShareRequest>(&query)
            .bind(device_id)
            .bind(actor)
            .bind(reason)
            .fetch_all(pool)
            .await
    }
}
