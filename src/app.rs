use std::sync::Arc;

use axum::http::{HeaderName, Method};
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::accounts::{AccountStore, Session, UserAccount};
use crate::authz::{AccessGate, AuthzMode, FeatureRegistry};
use crate::db::{lease, load_snapshot, save_snapshot, SnapshotKey, SqliteResourceLookup};
use crate::docs;
use crate::errors::{AppError, AppResult};
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::{JwtConfig, CSRF_HEADER};
use crate::routes::{access, auth, features, health, staff, users};
use crate::staff::StaffDirectory;
use crate::utils::utc_now;

/// Shared handler state. Lock order when holding several guards:
/// `staff`, then `accounts`, then `registry`.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub registry: Arc<RwLock<FeatureRegistry>>,
    pub staff: Arc<RwLock<StaffDirectory>>,
    pub accounts: Arc<RwLock<AccountStore>>,
    pub gate: AccessGate,
    pub event_bus: EventBus,
}

impl AppState {
    /// Loads every store from its snapshot, seeding defaults for missing ones.
    pub async fn load(pool: SqlitePool, jwt: JwtConfig, mode: AuthzMode, event_bus: EventBus) -> AppResult<Self> {
        let registry: FeatureRegistry = load_snapshot(&pool, SnapshotKey::FeaturePermissions)
            .await?
            .unwrap_or_default();
        let staff: StaffDirectory = load_snapshot(&pool, SnapshotKey::StaffIds).await?.unwrap_or_default();
        let users: Vec<UserAccount> = load_snapshot(&pool, SnapshotKey::Users).await?.unwrap_or_default();
        let sessions: Vec<Session> = load_snapshot(&pool, SnapshotKey::Sessions).await?.unwrap_or_default();

        let mut accounts = AccountStore::from_parts(users, sessions);
        let purged = accounts.purge_expired_sessions(utc_now());
        tracing::info!(
            features = registry.len(),
            staff_ids = staff.len(),
            purged_sessions = purged,
            ?mode,
            "stores loaded"
        );

        let registry = Arc::new(RwLock::new(registry));
        let lookup = Arc::new(SqliteResourceLookup::new(pool.clone()));
        let gate = AccessGate::new(Arc::clone(&registry), lookup, mode);

        Ok(Self {
            pool,
            jwt: Arc::new(jwt),
            registry,
            staff: Arc::new(RwLock::new(staff)),
            accounts: Arc::new(RwLock::new(accounts)),
            gate,
            event_bus,
        })
    }

    pub async fn save_staff(&self, directory: &StaffDirectory) -> AppResult<()> {
        save_snapshot(&self.pool, SnapshotKey::StaffIds, directory).await
    }

    /// Persists accounts and the session table together.
    pub async fn save_accounts(&self, accounts: &AccountStore) -> AppResult<()> {
        save_snapshot(&self.pool, SnapshotKey::Users, &accounts.users_snapshot()).await?;
        save_snapshot(&self.pool, SnapshotKey::Sessions, &accounts.sessions_snapshot()).await
    }

    pub async fn save_registry(&self, registry: &FeatureRegistry) -> AppResult<()> {
        save_snapshot(&self.pool, SnapshotKey::FeaturePermissions, registry).await
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, event_rx) = init_event_bus();
    let state = AppState::load(pool.clone(), jwt_config, AuthzMode::from_env(), event_bus).await?;

    // The CLI refuses snapshot writes while this lease is fresh.
    let holder = lease::process_holder();
    lease::acquire_lease(&pool, holder, utc_now()).await?;
    tokio::spawn(lease::run_heartbeat(pool.clone(), holder.to_string()));

    tokio::spawn(start_activity_listener(event_rx, pool));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(CSRF_HEADER)]);

    let port = std::env::var("APP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000);
    let openapi = docs::build_openapi(port);

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth::routes())
        .nest("/staff", staff::routes())
        .nest("/users", users::routes())
        .nest("/features", features::routes())
        .nest("/access", access::routes())
        .with_state(state)
        .merge(docs::swagger_routes(openapi))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
