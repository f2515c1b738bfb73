mod common;

use anyhow::Result;
use axum::http::StatusCode;

#[tokio::test]
async fn health_reports_database_and_seeded_features() -> Result<()> {
    let app = common::spawn_app().await?;

    let (status, body) = app.get("/api/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true);
    assert!(body["db_error"].is_null());
    assert_eq!(body["staff_ids"], 0);
    assert_eq!(body["features"], 7);

    Ok(())
}
