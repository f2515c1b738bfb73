//! Whole-store JSON snapshots in the `app_state` table.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKey {
    Users,
    Sessions,
    StaffIds,
    FeaturePermissions,
}

impl SnapshotKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotKey::Users => "users",
            SnapshotKey::Sessions => "session",
            SnapshotKey::StaffIds => "staff_ids",
            SnapshotKey::FeaturePermissions => "feature_permissions",
        }
    }
}

/// Returns `None` when nothing has been stored under `key` yet.
pub async fn load_snapshot<T: DeserializeOwned>(pool: &SqlitePool, key: SnapshotKey) -> AppResult<Option<T>> {
    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM app_state WHERE key = ?")
        .bind(key.as_str())
        .fetch_optional(pool)
        .await?;

    let Some(raw) = raw else {
        return Ok(None);
    };

    let deserializer = &mut serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(deserializer)
        .map(Some)
        .map_err(|err| {
            AppError::internal(format!(
                "corrupt {} snapshot at {}: {}",
                key.as_str(),
                err.path(),
                err.inner()
            ))
        })
}

pub async fn save_snapshot<T: Serialize>(pool: &SqlitePool, key: SnapshotKey, value: &T) -> AppResult<()> {
    let raw = serde_json::to_string(value)
        .map_err(|err| AppError::internal(format!("failed to encode {} snapshot: {err}", key.as_str())))?;

    sqlx::query(
        r#"
        INSERT INTO app_state (key, value, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key.as_str())
    .bind(raw)
    .bind(utc_now())
    .execute(pool)
    .await?;

    Ok(())
}
