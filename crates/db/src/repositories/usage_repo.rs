//! Repository for the `device_usage` table.
//!
//! Writes go through [`UsageRepo::save_state`], which carries an
//! `updated_at` guard: the UPDATE only applies if the row is unchanged
//! since it was read, making the engine's read-decide-write sections
//! atomic even if a writer bypasses the per-device lock.

use labrack_core::types::{DbId, Timestamp};
use labrack_core::usage::UsageState;
use sqlx::PgPool;

use crate::models::usage::UsageRecord;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, device_id, status, current_holder, start_time, expected_minutes, \
                       is_long_term, long_term_end, long_term_purpose, queue_users, updated_at";

/// Provides operations on per-device usage records.
pub struct UsageRepo;

impl UsageRepo {
    /// Fetch the usage record for a device, if one exists.
    pub async fn find_by_device(
        pool: &PgPool,
        device_id: DbId,
    ) -> Result<Option<UsageRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM device_usage WHERE device_id = $1");
        sqlx::query_as::<_, UsageRecord>(&query)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the usage record for a device, creating the default
    /// (available, empty queue) row on first access.
    pub async fn find_or_create(
        pool: &PgPool,
        device_id: DbId,
    ) -> Result<UsageRecord, sqlx::Error> {
        if let Some(record) = Self::find_by_device(pool, device_id).await? {
            return Ok(record);
        }

        // Racing creators are resolved by the unique constraint; the
        // loser falls through to the SELECT.
        sqlx::query("INSERT INTO device_usage (device_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(device_id)
            .execute(pool)
            .await?;

        let query = format!("SELECT {COLUMNS} FROM device_usage WHERE device_id = $1");
        sqlx::query_as::<_, UsageRecord>(&query)
            .bind(device_id)
            .fetch_one(pool)
            .await
    }

    /// Persist a state image, guarded on the `updated_at` read earlier.
    ///
    /// Returns `None` when the guard failed (the row changed underneath
    /// the caller), in which case the operation must be retried from the
    /// load step.
    pub async fn save_state(
        pool: &PgPool,
        device_id: DbId,
        state: &UsageState,
        guard: Timestamp,
    ) -> Result<Option<UsageRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE device_usage
             SET status = $3, current_holder = $4, start_time = $5, expected_minutes = $6,
                 is_long_term = $7, long_term_end = $8, long_term_purpose = $9,
                 queue_users = $10, updated_at = NOW()
             WHERE device_id = $1 AND updated_at = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UsageRecord>(&query)
            .bind(device_id)
            .bind(guard)
            .bind(state.status.as_str())
            .bind(&state.holder)
            .bind(state.start_time)
            .bind(state.expected_minutes)
            .bind(state.is_long_term)
            .bind(state.long_term_end)
            .bind(&state.long_term_purpose)
            .bind(&state.queue)
            .fetch_optional(pool)
            .await
    }

    /// All usage records, for bulk reclamation sweeps.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<UsageRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM device_usage ORDER BY device_id");
        sqlx::query_as::<_, UsageRecord>(&query)
            .fetch_all(pool)
            .await
    }
}
