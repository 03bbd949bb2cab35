//! Repository for the `devices` table.

use labrack_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::device::{CreateDevice, Device};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, ip_address, device_type, owner, creator, support_queue, \
                       max_occupancy_minutes, remarks, reachable, last_probe_at, \
                       last_check_at, created_at, updated_at";

/// Provides CRUD operations for devices.
pub struct DeviceRepo;

impl DeviceRepo {
    /// Insert a new device, returning the created row.
    ///
    /// The `ip_address` unique constraint surfaces duplicates as a
    /// database error the API layer maps to a conflict.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDevice,
        creator: &str,
    ) -> Result<Device, sqlx::Error> {
        let query = format!(
            "INSERT INTO devices (name, ip_address, device_type, owner, creator, support_queue,
                                  max_occupancy_minutes, remarks)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(&input.name)
            .bind(&input.ip_address)
            .bind(input.device_type.as_deref().unwrap_or("test"))
            .bind(&input.owner)
            .bind(creator)
            .bind(input.support_queue.unwrap_or(true))
            .bind(input.max_occupancy_minutes)
            .bind(&input.remarks)
            .fetch_one(pool)
            .await
    }

    /// Fetch a device by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE id = $1");
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all devices, oldest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices ORDER BY id");
        sqlx::query_as::<_, Device>(&query).fetch_all(pool).await
    }

    /// Fetch a specific set of devices.
    pub async fn list_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, Device>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Devices with a configured occupancy limit, for the rotation loop.
    pub async fn list_with_occupancy_limit(pool: &PgPool) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM devices
             WHERE max_occupancy_minutes IS NOT NULL
             ORDER BY id"
        );
        sqlx::query_as::<_, Device>(&query).fetch_all(pool).await
    }

    /// Persist the latest reachability verdict for a device.
    pub async fn update_connectivity(
        pool: &PgPool,
        id: DbId,
        reachable: bool,
        checked_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE devices
             SET reachable = $2, last_probe_at = $3, last_check_at = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(reachable)
        .bind(checked_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
