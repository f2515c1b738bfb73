mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

#[tokio::test]
async fn verify_reports_registered_available_and_invalid_ids() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    app.add_staff(
        &admin,
        json!({ "name": "Abena Owusu", "role": "district_engineer", "region": "ACCRA EAST REGION", "district": "MAKOLA" }),
    )
    .await?;

    let (status, body) = app.get("/staff/verify/ECG001", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["status"], "registered");
    assert_eq!(body["info"]["name"], "Abena Owusu");
    assert_eq!(body["info"]["district"], "MAKOLA");

    let (_, body) = app.get("/staff/verify/TEMA0001", None).await?;
    assert_eq!(body["valid"], true);
    assert_eq!(body["status"], "available_custom_id");
    assert!(body.get("info").is_none());

    // Unallocated generated codes cannot be claimed.
    for candidate in ["ECG999", "ab", "tema0001", "TOOLONGID123"] {
        let (_, body) = app.get(&format!("/staff/verify/{candidate}"), None).await?;
        assert_eq!(body["valid"], false, "{candidate}");
        assert_eq!(body["status"], "invalid", "{candidate}");
    }

    Ok(())
}

#[tokio::test]
async fn generated_ids_are_never_reused() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    let body = json!({ "name": "Yaw Global", "role": "global_engineer" });

    assert_eq!(app.add_staff(&admin, body.clone()).await?, "ECG001");
    assert_eq!(app.add_staff(&admin, body.clone()).await?, "ECG002");

    let (status, _) = app.request("DELETE", "/staff/ECG002", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(app.add_staff(&admin, body).await?, "ECG003");

    Ok(())
}

#[tokio::test]
async fn staff_management_needs_user_management_feature() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    let tech = app.signup_technician(&admin, "kojo@example.com").await?;

    let (status, _) = app.get("/staff", Some(&tech)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/staff", Some(&tech), json!({ "name": "Sneaky", "role": "global_engineer" }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/staff", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/staff", Some(&admin)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn incomplete_scope_and_duplicate_custom_ids_are_rejected() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    let (status, body) = app
        .post(
            "/staff",
            Some(&admin),
            json!({ "name": "Esi Ofori", "role": "district_engineer", "region": "TEMA REGION" }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "incomplete_scope");

    let custom = json!({
        "name": "Kofi Mensah",
        "role": "regional_engineer",
        "region": "TEMA REGION",
        "custom_id": "tema0001"
    });
    let (status, body) = app.post("/staff", Some(&admin), custom.clone()).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["id"], "TEMA0001");

    let (status, _) = app.post("/staff", Some(&admin), custom).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn bound_staff_ids_cannot_be_deleted() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    app.signup_technician(&admin, "kojo@example.com").await?;

    let (status, body) = app.request("DELETE", "/staff/ECG001", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "staff_id_in_use");

    let (status, _) = app.request("DELETE", "/staff/ECG404", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn staff_updates_flow_into_the_bound_account() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    let tech = app.signup_technician(&admin, "kojo@example.com").await?;

    let (status, body) = app
        .request(
            "PUT",
            "/staff/ECG001",
            Some(&admin),
            Some(json!({
                "name": "Kojo Mensah",
                "role": "district_engineer",
                "region": "ACCRA EAST REGION",
                "district": "LEGON"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["role"], "district_engineer");

    let (status, me) = app.get("/auth/me", Some(&tech)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Kojo Mensah");
    assert_eq!(me["role"], "district_engineer");
    assert_eq!(me["district"], "LEGON");

    // District engineers may open the analytics dashboard; technicians may not.
    let (_, access) = app.get("/features/analytics_dashboard/access", Some(&tech)).await?;
    assert_eq!(access["allowed"], true);

    Ok(())
}

#[tokio::test]
async fn csv_import_reports_each_bad_row() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    let csv = "\
name,role,region,district,customId
Ama Boateng,technician,ACCRA EAST REGION,MAKOLA,
Kofi Mensah,regional_engineer,TEMA REGION,,TEMA0001
Root,system_admin,,,
Yaw Darko,district_engineer,TEMA REGION,,
";
    let req = Request::builder()
        .method("POST")
        .uri("/staff/import")
        .header("authorization", format!("Bearer {}", admin.token))
        .header("x-csrf-token", &admin.csrf)
        .header("content-type", "text/csv")
        .body(Body::from(csv))?;

    let (status, report) = app.send(req).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["imported"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["imported"][0]["id"], "ECG001");
    assert_eq!(report["imported"][1]["id"], "TEMA0001");
    assert_eq!(report["skipped"], 2);
    assert_eq!(report["errors"][0]["line"], 4);
    assert_eq!(report["errors"][1]["line"], 5);

    let (_, health) = app.get("/api/health", None).await?;
    assert_eq!(health["staff_ids"], 2);

    Ok(())
}
