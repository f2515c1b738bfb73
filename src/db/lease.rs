//! Ownership of the snapshot tables by a running server.
//!
//! A server keeps every store in memory and rewrites whole snapshots on each
//! mutation. Offline writers (the admin CLI) check the lease and refuse to run
//! while a server holds it.

use std::sync::OnceLock;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

pub const HEARTBEAT_SECS: u64 = 10;
pub const LEASE_TTL_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ServerLease {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
}

impl ServerLease {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now - self.heartbeat_at < Duration::seconds(LEASE_TTL_SECS)
    }
}

/// Lease identity of this process.
pub fn process_holder() -> &'static str {
    static HOLDER: OnceLock<String> = OnceLock::new();
    HOLDER.get_or_init(|| format!("{}:{}", std::process::id(), Uuid::new_v4()))
}

pub async fn current_lease(pool: &SqlitePool) -> AppResult<Option<ServerLease>> {
    let lease = sqlx::query_as::<_, ServerLease>(
        "SELECT holder, acquired_at, heartbeat_at FROM server_lease WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(lease)
}

/// Takes the lease, replacing whatever was there.
pub async fn acquire_lease(pool: &SqlitePool, holder: &str, now: DateTime<Utc>) -> AppResult<()> {
    if let Some(previous) = current_lease(pool).await? {
        if previous.holder != holder && previous.is_live_at(now) {
            tracing::warn!(previous = %previous.holder, "taking over a live server lease");
        }
    }

    sqlx::query(
        r#"
        INSERT INTO server_lease (id, holder, acquired_at, heartbeat_at) VALUES (1, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            holder = excluded.holder,
            acquired_at = excluded.acquired_at,
            heartbeat_at = excluded.heartbeat_at
        "#,
    )
    .bind(holder)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(holder, "server lease acquired");
    Ok(())
}

/// Returns `false` when `holder` no longer owns the lease.
pub async fn refresh_lease(pool: &SqlitePool, holder: &str, now: DateTime<Utc>) -> AppResult<bool> {
    let result = sqlx::query("UPDATE server_lease SET heartbeat_at = ? WHERE id = 1 AND holder = ?")
        .bind(now)
        .bind(holder)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn release_lease(pool: &SqlitePool, holder: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM server_lease WHERE id = 1 AND holder = ?")
        .bind(holder)
        .execute(pool)
        .await?;
    tracing::info!(holder, "server lease released");
    Ok(())
}

/// Fails with `Conflict` while a server holds a fresh lease on this database.
pub async fn ensure_offline(pool: &SqlitePool, now: DateTime<Utc>) -> AppResult<()> {
    match current_lease(pool).await? {
        Some(lease) if lease.is_live_at(now) => Err(AppError::conflict(format!(
            "a running server ({}) owns this database; stop it first or wait {LEASE_TTL_SECS}s after it exits",
            lease.holder
        ))),
        _ => Ok(()),
    }
}

/// Keeps the lease fresh until the runtime shuts down.
pub async fn run_heartbeat(pool: SqlitePool, holder: String) {
    let mut ticker = tokio::time::interval(StdDuration::from_secs(HEARTBEAT_SECS));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let now = utc_now();
        match refresh_lease(&pool, &holder, now).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(holder = %holder, "server lease lost, reacquiring");
                if let Err(err) = acquire_lease(&pool, &holder, now).await {
                    tracing::error!(error = %err, "failed to reacquire server lease");
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to refresh server lease"),
        }
    }
}
