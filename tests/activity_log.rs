mod common;

use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use outage_access::events::verify_chain;

async fn wait_for_event(pool: &SqlitePool, event_name: &str) -> Result<Option<(String, String, String)>> {
    for _ in 0..50 {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT subject_id, properties, severity FROM activity_log WHERE event_name = ? ORDER BY occurred_at DESC LIMIT 1",
        )
        .bind(event_name)
        .fetch_optional(pool)
        .await?;
        if row.is_some() {
            return Ok(row);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(None)
}

#[tokio::test]
async fn mutations_are_logged_and_chained() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    app.signup_technician(&admin, "kojo@example.com").await?;

    let (subject, _, severity) = wait_for_event(&app.pool, "staff_id.created")
        .await?
        .ok_or_else(|| anyhow::anyhow!("staff_id.created was not logged"))?;
    assert_eq!(subject, "ECG001");
    assert_eq!(severity, "important");

    let (_, properties, _) = wait_for_event(&app.pool, "user.registered")
        .await?
        .ok_or_else(|| anyhow::anyhow!("user.registered was not logged"))?;
    let properties: Value = serde_json::from_str(&properties)?;
    let text = properties.to_string();
    assert!(text.contains("kojo@example.com"));
    assert!(!text.contains("argon2"), "credential material leaked: {text}");

    let (status, _) = app
        .request("DELETE", "/features/fault_management", Some(&admin), None)
        .await?;
    assert_eq!(status, axum::http::StatusCode::NO_CONTENT);
    let (subject, _, severity) = wait_for_event(&app.pool, "feature.deleted")
        .await?
        .ok_or_else(|| anyhow::anyhow!("feature.deleted was not logged"))?;
    assert_eq!(subject, "fault_management");
    assert_eq!(severity, "critical");

    let chained: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_store")
        .fetch_one(&app.pool)
        .await?;
    assert!(chained >= 3);
    assert_eq!(verify_chain(&app.pool).await?, None);

    Ok(())
}

#[tokio::test]
async fn tampering_breaks_the_chain() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    app.post("/staff", Some(&admin), json!({ "name": "Yaw Global", "role": "global_engineer" }))
        .await?;
    app.post("/staff", Some(&admin), json!({ "name": "Esi Global", "role": "global_engineer" }))
        .await?;

    let mut rows = 0i64;
    for _ in 0..50 {
        rows = sqlx::query_scalar("SELECT COUNT(*) FROM event_store WHERE event_name = 'staff_id.created'")
            .fetch_one(&app.pool)
            .await?;
        if rows >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(rows, 2);

    let first: i64 = sqlx::query_scalar("SELECT MIN(seq) FROM event_store WHERE event_name = 'staff_id.created'")
        .fetch_one(&app.pool)
        .await?;
    sqlx::query("UPDATE event_store SET payload = '{}' WHERE seq = ?")
        .bind(first)
        .execute(&app.pool)
        .await?;

    assert_eq!(verify_chain(&app.pool).await?, Some(first));

    Ok(())
}
