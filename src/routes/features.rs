//! Feature permission registry endpoints.
//!
//! Reads are open to any session. Mutations need `system_configuration` and may
//! never leave system_admin without it.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{features, AccessRequirement, FeatureKey, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context};
use crate::jwt::AuthUser;
use crate::models::feature::{Feature, FeatureAccessResponse, FeatureCreateRequest, FeatureUpdateRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_features).post(create_feature))
        .route("/:key", put(update_feature).delete(delete_feature))
        .route("/:key/access", get(feature_access))
}

async fn require_system_configuration(state: &AppState, auth: &AuthUser) -> AppResult<()> {
    state
        .gate
        .require(&auth.principal, &AccessRequirement::feature(features::SYSTEM_CONFIGURATION))
        .await
}

fn guard_lockout(key: &FeatureKey, roles: Option<&BTreeSet<Role>>) -> AppResult<()> {
    if key.as_str() != features::SYSTEM_CONFIGURATION {
        return Ok(());
    }
    match roles {
        Some(roles) if roles.contains(&Role::SystemAdmin) => Ok(()),
        _ => Err(AppError::conflict("system_admin must keep access to system_configuration")),
    }
}

#[utoipa::path(
    get,
    path = "/features",
    tag = "Features",
    responses((status = 200, description = "Every feature with its allowed roles", body = Vec<Feature>)),
    security(("bearerAuth" = []))
)]
pub async fn list_features(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<Feature>>> {
    let registry = state.registry.read().await;
    let features = registry
        .list_all()
        .iter()
        .map(|(key, roles)| Feature::new(key, roles))
        .collect();
    Ok(Json(features))
}

#[utoipa::path(
    post,
    path = "/features",
    tag = "Features",
    request_body = FeatureCreateRequest,
    responses(
        (status = 201, description = "Feature added", body = Feature),
        (status = 409, description = "Feature already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_feature(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<FeatureCreateRequest>,
) -> AppResult<(StatusCode, Json<Feature>)> {
    require_system_configuration(&state, &auth).await?;
    let key = FeatureKey::parse(&payload.key)?;
    let roles: BTreeSet<Role> = payload.roles.into_iter().collect();

    let mut registry = state.registry.write().await;
    registry.add_feature(key.clone(), roles.iter().copied())?;
    state.save_registry(&registry).await?;

    let feature = Feature::new(&key, &roles);
    log_activity(&state.event_bus, "created", Some(auth.user_id), &feature);
    Ok((StatusCode::CREATED, Json(feature)))
}

#[utoipa::path(
    put,
    path = "/features/{key}",
    tag = "Features",
    params(("key" = String, Path, description = "Feature key")),
    request_body = FeatureUpdateRequest,
    responses(
        (status = 200, description = "Role set replaced", body = Feature),
        (status = 404, description = "Unknown feature"),
        (status = 409, description = "Would lock system_admin out")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_feature(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
    Json(payload): Json<FeatureUpdateRequest>,
) -> AppResult<Json<Feature>> {
    require_system_configuration(&state, &auth).await?;
    let key = FeatureKey::parse(&key)?;
    let roles: BTreeSet<Role> = payload.roles.into_iter().collect();
    guard_lockout(&key, Some(&roles))?;

    let mut registry = state.registry.write().await;
    let old = registry.roles_for(&key).map(|previous| Feature::new(&key, previous));
    registry.update_feature_permissions(&key, roles.iter().copied())?;
    state.save_registry(&registry).await?;

    let feature = Feature::new(&key, &roles);
    log_activity_with_context(&state.event_bus, "updated", Some(auth.user_id), &feature, old.as_ref(), None);
    Ok(Json(feature))
}

#[utoipa::path(
    delete,
    path = "/features/{key}",
    tag = "Features",
    params(("key" = String, Path, description = "Feature key")),
    responses(
        (status = 204, description = "Feature removed"),
        (status = 404, description = "Unknown feature"),
        (status = 409, description = "Would lock system_admin out")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_feature(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
) -> AppResult<StatusCode> {
    require_system_configuration(&state, &auth).await?;
    let key = FeatureKey::parse(&key)?;
    guard_lockout(&key, None)?;

    let mut registry = state.registry.write().await;
    let roles = registry.remove_feature(&key)?;
    state.save_registry(&registry).await?;

    log_activity(&state.event_bus, "deleted", Some(auth.user_id), &Feature::new(&key, &roles));
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/features/{key}/access",
    tag = "Features",
    params(("key" = String, Path, description = "Feature key")),
    responses((status = 200, description = "Whether the caller's role may use the feature", body = FeatureAccessResponse)),
    security(("bearerAuth" = []))
)]
pub async fn feature_access(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
) -> AppResult<Json<FeatureAccessResponse>> {
    let role = auth.principal.role;
    let allowed = state.registry.read().await.can_access(role, &key);
    Ok(Json(FeatureAccessResponse {
        feature: key,
        role,
        allowed,
    }))
}
