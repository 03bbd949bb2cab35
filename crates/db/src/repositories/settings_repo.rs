//! Repository for the `system_settings` singleton row.

use sqlx::PgPool;

use crate::models::settings::SystemSettings;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, cleanup_time, updated_at";

/// Provides access to the system settings row.
pub struct SettingsRepo;

impl SettingsRepo {
    /// Fetch the settings row, creating the default one if the seed row
    /// was ever removed.
    pub async fn get_or_create(pool: &PgPool) -> Result<SystemSettings, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM system_settings ORDER BY id LIMIT 1");
        if let Some(settings) = sqlx::query_as::<_, SystemSettings>(&query)
            .fetch_optional(pool)
            .await?
        {
            return Ok(settings);
        }

        let insert = format!("INSERT INTO system_settings DEFAULT VALUES RETURNING {COLUMNS}");
        sqlx::query_as::<_, SystemSettings>(&insert)
            .fetch_one(pool)
            .await
    }

    /// Update the daily cleanup time, returning the new row.
    pub async fn update_cleanup_time(
        pool: &PgPool,
        cleanup_time: &str,
    ) -> Result<SystemSettings, sqlx::Error> {
        let query = format!(
            "UPDATE system_settings
             SET cleanup_time = $1, updated_at = NOW()
             WHERE id = (SELECT id FROM system_settings ORDER BY id LIMIT 1)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SystemSettings>(&query)
            .bind(cleanup_time)
            .fetch_one(pool)
            .await
    }
}
