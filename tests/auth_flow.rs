mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{Credentials, PASSWORD};

fn technician_signup(email: &str, staff_id: &str) -> serde_json::Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "name": "K. Tech",
        "role": "technician",
        "region": "Accra East Region",
        "district": "makola",
        "staff_id": staff_id
    })
}

#[tokio::test]
async fn signup_binds_staff_id_and_uses_directory_name() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    let staff_id = app
        .add_staff(
            &admin,
            json!({ "name": "Kojo Tech", "role": "technician", "region": "ACCRA EAST REGION", "district": "MAKOLA" }),
        )
        .await?;
    assert_eq!(staff_id, "ECG001");

    let (status, body) = app
        .post("/auth/signup", None, technician_signup("kojo@example.com", &staff_id))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let creds = common::credentials(&body);

    let (status, me) = app.get("/auth/me", Some(&creds)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Kojo Tech");
    assert_eq!(me["role"], "technician");
    assert_eq!(me["region"], "ACCRA EAST REGION");
    assert_eq!(me["district"], "MAKOLA");
    assert_eq!(me["staff_id"], "ECG001");

    // A staff id binds at most one account.
    let (status, body) = app
        .post("/auth/signup", None, technician_signup("other@example.com", &staff_id))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_staff_id");

    Ok(())
}

#[tokio::test]
async fn signup_rejects_mismatched_scope_and_admin_role() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    let staff_id = app
        .add_staff(
            &admin,
            json!({ "name": "Kojo Tech", "role": "technician", "region": "ACCRA EAST REGION", "district": "MAKOLA" }),
        )
        .await?;

    let mut wrong_region = technician_signup("kojo@example.com", &staff_id);
    wrong_region["region"] = json!("ASHANTI REGION");
    let (status, body) = app.post("/auth/signup", None, wrong_region).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "staff_id_mismatch");

    let mut wrong_role = technician_signup("kojo@example.com", &staff_id);
    wrong_role["role"] = json!("district_engineer");
    let (status, body) = app.post("/auth/signup", None, wrong_role).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "staff_id_mismatch");

    let (status, body) = app
        .post(
            "/auth/signup",
            None,
            json!({ "email": "root2@example.com", "password": PASSWORD, "name": "Root", "role": "system_admin" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = app
        .post(
            "/auth/signup",
            None,
            json!({
                "email": "nostaff@example.com",
                "password": PASSWORD,
                "name": "No Staff",
                "role": "district_engineer",
                "region": "ACCRA EAST REGION",
                "district": "MAKOLA"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "staff_id_required");

    // The failed attempts left the id free.
    let (status, _) = app
        .post("/auth/signup", None, technician_signup("kojo@example.com", &staff_id))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn signup_with_unregistered_custom_id_registers_it() -> Result<()> {
    let app = common::spawn_app().await?;

    let (status, body) = app
        .post(
            "/auth/signup",
            None,
            json!({
                "email": "ama@example.com",
                "password": PASSWORD,
                "name": "Ama Serwaa",
                "role": "regional_engineer",
                "region": "ASHANTI REGION",
                "staff_id": "AMA12345"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, verified) = app.get("/staff/verify/AMA12345", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["status"], "registered");
    assert_eq!(verified["info"]["role"], "regional_engineer");
    assert_eq!(verified["info"]["region"], "ASHANTI REGION");

    Ok(())
}

#[tokio::test]
async fn login_is_throttled_after_repeated_failures() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    app.signup_technician(&admin, "kojo@example.com").await?;

    for _ in 0..5 {
        let (status, body) = app
            .post("/auth/login", None, json!({ "email": "kojo@example.com", "password": "Wrong0000" }))
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_credentials");
    }

    let (status, body) = app
        .post("/auth/login", None, json!({ "email": "kojo@example.com", "password": PASSWORD }))
        .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "too_many_attempts");

    // Other accounts are unaffected.
    app.login_admin().await?;

    Ok(())
}

#[tokio::test]
async fn logout_requires_csrf_token_and_revokes_session() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    let creds = app.signup_technician(&admin, "kojo@example.com").await?;

    let no_csrf = Credentials {
        token: creds.token.clone(),
        csrf: String::new(),
    };
    let (status, _) = app.request("POST", "/auth/logout", Some(&no_csrf), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reads do not need the CSRF token.
    let (status, _) = app.get("/auth/me", Some(&no_csrf)).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request("POST", "/auth/logout", Some(&creds), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out");

    let (status, _) = app.get("/auth/me", Some(&creds)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn csrf_rotation_invalidates_previous_token() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    let (status, body) = app.request("POST", "/auth/csrf", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    let rotated = Credentials {
        token: admin.token.clone(),
        csrf: body["csrf_token"].as_str().unwrap_or_default().to_string(),
    };
    assert_ne!(rotated.csrf, admin.csrf);

    let (status, _) = app
        .post("/features", Some(&admin), json!({ "key": "outage_reporting", "roles": ["technician"] }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/features", Some(&rotated), json!({ "key": "outage_reporting", "roles": ["technician"] }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn temporary_password_forces_a_change_before_anything_else() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    let (status, body) = app
        .post(
            "/users",
            Some(&admin),
            json!({ "email": "Yaw@Example.com", "name": "Yaw Global", "role": "global_engineer" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["email"], "yaw@example.com");
    assert_eq!(body["user"]["must_change_password"], true);
    let temp = body["temp_password"].as_str().unwrap_or_default().to_string();
    assert_eq!(temp.len(), 12);

    let creds = app.login("yaw@example.com", &temp).await?;

    let (status, body) = app.get("/features", Some(&creds)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "password_change_required");

    // The gate answers with a decision rather than an error.
    let (status, body) = app
        .post("/access/check", Some(&creds), json!({ "kind": "authenticated" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "redirect_to_unauthorized");
    assert_eq!(body["redirect_to"], "/unauthorized");

    let (status, _) = app
        .post(
            "/auth/change-password",
            Some(&creds),
            json!({ "current_password": temp, "new_password": "weak" }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .post(
            "/auth/change-password",
            Some(&creds),
            json!({ "current_password": temp, "new_password": "NewPassw0rd" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["must_change_password"], false);

    let (status, _) = app.get("/features", Some(&creds)).await?;
    assert_eq!(status, StatusCode::OK);

    // The temporary password no longer works.
    let (status, _) = app
        .post("/auth/login", None, json!({ "email": "yaw@example.com", "password": temp }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.login("yaw@example.com", "NewPassw0rd").await?;

    Ok(())
}

#[tokio::test]
async fn disabled_accounts_cannot_log_in_until_enabled() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    let creds = app.signup_technician(&admin, "kojo@example.com").await?;

    let (_, me) = app.get("/auth/me", Some(&creds)).await?;
    let user_id = me["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = app
        .request("POST", &format!("/users/{user_id}/disable"), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disabled"], true);

    // Existing sessions are revoked.
    let (status, _) = app.get("/auth/me", Some(&creds)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post("/auth/login", None, json!({ "email": "kojo@example.com", "password": PASSWORD }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "account_disabled");

    let (status, _) = app
        .request("POST", &format!("/users/{user_id}/enable"), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    app.login("kojo@example.com", PASSWORD).await?;

    Ok(())
}

#[tokio::test]
async fn admins_cannot_disable_themselves() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;

    let (_, me) = app.get("/auth/me", Some(&admin)).await?;
    let admin_id = me["id"].as_str().unwrap_or_default().to_string();

    let (status, _) = app
        .request("POST", &format!("/users/{admin_id}/disable"), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request("DELETE", &format!("/users/{admin_id}"), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

/// Global engineer with a permanent password, created through the admin API.
async fn global_engineer(app: &common::TestApp, admin: &Credentials, email: &str) -> Result<Credentials> {
    let (status, body) = app
        .post(
            "/users",
            Some(admin),
            json!({ "email": email, "name": "Yaw Global", "role": "global_engineer" }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "add user failed: {status} {body}");
    let temp = body["temp_password"].as_str().unwrap_or_default().to_string();

    let creds = app.login(email, &temp).await?;
    let (status, body) = app
        .post(
            "/auth/change-password",
            Some(&creds),
            json!({ "current_password": temp, "new_password": PASSWORD }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::OK, "change password failed: {status} {body}");
    Ok(creds)
}

#[tokio::test]
async fn user_management_cannot_create_system_admins() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    let global = global_engineer(&app, &admin, "yaw@example.com").await?;

    let (status, body) = app
        .post(
            "/users",
            Some(&global),
            json!({ "email": "root2@example.com", "name": "Second Root", "role": "system_admin" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // Not even a system_admin caller can mint one through the API.
    let (status, _) = app
        .post(
            "/users",
            Some(&admin),
            json!({ "email": "root2@example.com", "name": "Second Root", "role": "system_admin" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/auth/login", None, json!({ "email": "root2@example.com", "password": PASSWORD }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn only_system_admins_reset_system_admin_passwords() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.login_admin().await?;
    let global = global_engineer(&app, &admin, "yaw@example.com").await?;
    app.signup_technician(&admin, "kojo@example.com").await?;

    let (status, body) = app
        .post(
            "/users/reset-password",
            Some(&global),
            json!({ "email": common::ADMIN_EMAIL, "new_password": "Hijack3d1" }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = app
        .post("/auth/login", None, json!({ "email": common::ADMIN_EMAIL, "password": "Hijack3d1" }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.login_admin().await?;

    // Ranked accounts stay manageable by both.
    let (status, _) = app
        .post(
            "/users/reset-password",
            Some(&global),
            json!({ "email": "kojo@example.com", "new_password": "Fr3shPass" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    app.login("kojo@example.com", "Fr3shPass").await?;

    let (status, _) = app
        .post(
            "/users/reset-password",
            Some(&admin),
            json!({ "email": "kojo@example.com", "new_password": "Adm1nReset" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    app.login("kojo@example.com", "Adm1nReset").await?;

    Ok(())
}
