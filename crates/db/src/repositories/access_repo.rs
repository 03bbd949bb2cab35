//! Repository for the `access_entries` table.

use labrack_core::types::DbId;
use sqlx::PgPool;

use crate::models::access::AccessEntry;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, device_id, identity, role, network_address, created_at, updated_at";

/// Provides operations on derived access entries.
pub struct AccessEntryRepo;

impl AccessEntryRepo {
    /// Create or refresh the entry for (device, identity).
    pub async fn upsert(
        pool: &PgPool,
        device_id: DbId,
        identity: &str,
        role: &str,
        network_address: Option<&str>,
    ) -> Result<AccessEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO access_entries (device_id, identity, role, network_address)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT uq_access_entries_device_identity
             DO UPDATE SET role = $3, network_address = $4, updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AccessEntry>(&query)
            .bind(device_id)
            .bind(identity)
            .bind(role)
            .bind(network_address)
            .fetch_one(pool)
            .await
    }

    /// Remove the entry for (device, identity). Returns `true` if a row
    /// was deleted.
    pub async fn delete(
        pool: &PgPool,
        device_id: DbId,
        identity: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM access_entries WHERE device_id = $1 AND identity = $2")
                .bind(device_id)
                .bind(identity)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove all entries with a given role for a device. Returns the
    /// count of deleted rows.
    pub async fn delete_by_role(
        pool: &PgPool,
        device_id: DbId,
        role: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM access_entries WHERE device_id = $1 AND role = $2")
            .bind(device_id)
            .bind(role)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove every entry for a device (bulk reclamation).
    pub async fn delete_for_device(pool: &PgPool, device_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM access_entries WHERE device_id = $1")
            .bind(device_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// All entries for a device.
    pub async fn list_for_device(
        pool: &PgPool,
        device_id: DbId,
    ) -> Result<Vec<AccessEntry>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM access_entries WHERE device_id = $1 ORDER BY id");
        sqlx::query_as::<_, AccessEntry>(&query)
            .bind(device_id)
            .fetch_all(pool)
            .await
    }
}
