//! Repository for the `usage_history` table.

use labrack_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::history::{OpenUsageHistory, UsageHistoryEntry};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, device_id, holder, start_time, end_time, duration_minutes, purpose, created_at";

/// Provides operations on usage history entries.
pub struct UsageHistoryRepo;

impl UsageHistoryRepo {
    /// Open a history entry when a holder acquires a device.
    pub async fn open(
        pool: &PgPool,
        input: &OpenUsageHistory,
    ) -> Result<UsageHistoryEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO usage_history (device_id, holder, start_time, purpose)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UsageHistoryEntry>(&query)
            .bind(input.device_id)
            .bind(&input.holder)
            .bind(input.start_time)
            .bind(&input.purpose)
            .fetch_one(pool)
            .await
    }

    /// Close the open entry for (device, holder), stamping end time and
    /// duration. Returns the count of closed rows (0 when none was open).
    pub async fn close_open(
        pool: &PgPool,
        device_id: DbId,
        holder: &str,
        end_time: Timestamp,
        duration_minutes: i32,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE usage_history
             SET end_time = $3, duration_minutes = $4
             WHERE device_id = $1 AND holder = $2 AND end_time IS NULL",
        )
        .bind(device_id)
        .bind(holder)
        .bind(end_time)
        .bind(duration_minutes)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Recent history for a device, newest first.
    pub async fn list_for_device(
        pool: &PgPool,
        device_id: DbId,
        limit: i64,
    ) -> Result<Vec<UsageHistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM usage_history
             WHERE device_id = $1 ORDER BY start_time DESC LIMIT $2"
        );
        sqlx::query_as::<_, UsageHistoryEntry>(&query)
            .bind(device_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
