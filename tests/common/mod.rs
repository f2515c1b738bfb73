#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use outage_access::accounts::AccountStore;
use outage_access::create_app;
use outage_access::db::{save_snapshot, SnapshotKey};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "Adm1nPassword";
pub const PASSWORD: &str = "Passw0rd";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Bearer token plus the CSRF token that must accompany mutating requests.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub csrf: String,
}

pub async fn test_pool() -> Result<(SqlitePool, TempDir)> {
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

/// Fresh database with one system_admin account, and a router over it.
pub async fn spawn_app() -> Result<TestApp> {
    let (pool, dir) = test_pool().await?;

    let mut accounts = AccountStore::new();
    accounts.create_system_admin(ADMIN_EMAIL, "Root Admin", ADMIN_PASSWORD, Utc::now())?;
    save_snapshot(&pool, SnapshotKey::Users, &accounts.users_snapshot()).await?;

    std::env::set_var("SESSION_SECRET", "test-secret");
    let router = create_app(pool.clone()).await?;

    Ok(TestApp {
        router,
        pool,
        _dir: dir,
    })
}

impl TestApp {
    /// Rebuilds the router over the same database, as a restart would.
    pub async fn restart(&mut self) -> Result<()> {
        self.router = create_app(self.pool.clone()).await?;
        Ok(())
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        auth: Option<&Credentials>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder
                .header("authorization", format!("Bearer {}", auth.token))
                .header("x-csrf-token", &auth.csrf);
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        self.send(req).await
    }

    /// Sends a prebuilt request and decodes the JSON body (`Null` when empty).
    pub async fn send(&self, req: Request<Body>) -> Result<(StatusCode, Value)> {
        let resp = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, auth: Option<&Credentials>) -> Result<(StatusCode, Value)> {
        self.request("GET", uri, auth, None).await
    }

    pub async fn post(&self, uri: &str, auth: Option<&Credentials>, body: Value) -> Result<(StatusCode, Value)> {
        self.request("POST", uri, auth, Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Credentials> {
        let (status, body) = self
            .post("/auth/login", None, json!({ "email": email, "password": password }))
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {status} {body}");
        Ok(credentials(&body))
    }

    pub async fn login_admin(&self) -> Result<Credentials> {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registers a staff id through the admin API and returns the allocated id.
    pub async fn add_staff(&self, admin: &Credentials, body: Value) -> Result<String> {
        let (status, created) = self.post("/staff", Some(admin), body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "add staff failed: {status} {created}");
        Ok(created["id"].as_str().unwrap_or_default().to_string())
    }

    /// Signs up a technician bound to a freshly allocated staff id in MAKOLA.
    pub async fn signup_technician(&self, admin: &Credentials, email: &str) -> Result<Credentials> {
        let staff_id = self
            .add_staff(
                admin,
                json!({
                    "name": "Kojo Tech",
                    "role": "technician",
                    "region": "ACCRA EAST REGION",
                    "district": "MAKOLA"
                }),
            )
            .await?;

        let (status, body) = self
            .post(
                "/auth/signup",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "name": "Kojo Tech",
                    "role": "technician",
                    "region": "ACCRA EAST REGION",
                    "district": "MAKOLA",
                    "staff_id": staff_id
                }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "signup failed: {status} {body}");
        Ok(credentials(&body))
    }
}

pub fn credentials(auth_response: &Value) -> Credentials {
    Credentials {
        token: auth_response["token"].as_str().unwrap_or_default().to_string(),
        csrf: auth_response["csrf_token"].as_str().unwrap_or_default().to_string(),
    }
}
