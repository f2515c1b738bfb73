use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{features, AccessRequirement, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{AddUserRequest, AddUserResponse, ResetPasswordRequest, User};
use crate::utils::utc_now;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(add_user))
        .route("/reset-password", post(reset_password))
        .route("/:id", delete(delete_user))
        .route("/:id/disable", post(disable_user))
        .route("/:id/enable", post(enable_user))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "All accounts", body = Vec<User>)),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<User>>> {
    state
        .gate
        .require(&auth.principal, &AccessRequirement::feature(features::USER_MANAGEMENT))
        .await?;

    let accounts = state.accounts.read().await;
    Ok(Json(accounts.list().into_iter().map(User::from).collect()))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = AddUserRequest,
    responses(
        (status = 201, description = "Account created with a temporary password", body = AddUserResponse),
        (status = 403, description = "system_admin accounts cannot be created here"),
        (status = 409, description = "Email or staff id already in use"),
        (status = 422, description = "Staff id not registered or does not match")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<AddUserRequest>,
) -> AppResult<(StatusCode, Json<AddUserResponse>)> {
    state
        .gate
        .require(&auth.principal, &AccessRequirement::feature(features::USER_MANAGEMENT))
        .await?;

    let staff = state.staff.read().await;
    let mut accounts = state.accounts.write().await;
    let (account, temp_password) = accounts.add_user(&staff, payload.into(), utc_now())?;
    state.save_accounts(&accounts).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &account,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((
        StatusCode::CREATED,
        Json(AddUserResponse {
            user: User::from(&account),
            temp_password,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/users/reset-password",
    tag = "Users",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = User),
        (status = 403, description = "Target is a system_admin and the caller is not"),
        (status = 404, description = "No account with that email")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<User>> {
    state
        .gate
        .require(&auth.principal, &AccessRequirement::feature(features::USER_MANAGEMENT))
        .await?;

    let mut accounts = state.accounts.write().await;
    let target_is_admin = accounts
        .find_by_email(&payload.email)
        .is_some_and(|target| target.role == Some(Role::SystemAdmin));
    if target_is_admin && !auth.principal.is_system_admin() {
        return Err(AppError::forbidden("only a system_admin may reset a system_admin password"));
    }
    let account = accounts.reset_password(&payload.email, &payload.new_password, utc_now())?;
    state.save_accounts(&accounts).await?;

    log_activity(&state.event_bus, "password_reset", Some(auth.user_id), &account);
    Ok(Json(User::from(&account)))
}

#[utoipa::path(
    post,
    path = "/users/{id}/disable",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Account disabled, sessions revoked", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn disable_user(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    state.gate.require(&auth.principal, &AccessRequirement::SystemAdmin).await?;
    if id == auth.user_id {
        return Err(AppError::conflict("administrators cannot disable their own account"));
    }

    let mut accounts = state.accounts.write().await;
    let account = accounts.disable(id, utc_now())?;
    state.save_accounts(&accounts).await?;

    log_activity(&state.event_bus, "disabled", Some(auth.user_id), &account);
    Ok(Json(User::from(&account)))
}

#[utoipa::path(
    post,
    path = "/users/{id}/enable",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Account enabled", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn enable_user(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    state.gate.require(&auth.principal, &AccessRequirement::SystemAdmin).await?;

    let mut accounts = state.accounts.write().await;
    let account = accounts.enable(id, utc_now())?;
    state.save_accounts(&accounts).await?;

    log_activity(&state.event_bus, "enabled", Some(auth.user_id), &account);
    Ok(Json(User::from(&account)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    state.gate.require(&auth.principal, &AccessRequirement::SystemAdmin).await?;
    if id == auth.user_id {
        return Err(AppError::conflict("administrators cannot delete their own account"));
    }

    let mut accounts = state.accounts.write().await;
    let removed = accounts.delete_account(id)?;
    state.save_accounts(&accounts).await?;

    log_activity(&state.event_bus, "deleted", Some(auth.user_id), &removed);
    Ok(StatusCode::NO_CONTENT)
}
