//! Staff directory endpoints. Everything except verification requires the
//! `user_management` feature.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{features, AccessRequirement};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context};
use crate::jwt::AuthUser;
use crate::models::staff::{StaffCreateRequest, StaffUpdateRequest, VerifyStaffIdResponse};
use crate::staff::{import_csv, ImportReport, StaffRecord};
use crate::utils::utc_now;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_staff).post(create_staff))
        .route("/verify/:id", get(verify_staff_id))
        .route("/import", post(import_staff))
        .route("/:id", put(update_staff).delete(delete_staff))
}

async fn require_user_management(state: &AppState, auth: &AuthUser) -> AppResult<()> {
    state
        .gate
        .require(&auth.principal, &AccessRequirement::feature(features::USER_MANAGEMENT))
        .await
}

#[utoipa::path(
    get,
    path = "/staff/verify/{id}",
    tag = "Staff",
    params(("id" = String, Path, description = "Candidate staff id")),
    responses((status = 200, description = "Verification result", body = VerifyStaffIdResponse))
)]
pub async fn verify_staff_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<VerifyStaffIdResponse>> {
    let candidate = id.trim().to_string();
    let staff = state.staff.read().await;
    let verification = staff.verify_staff_id(&candidate);
    Ok(Json(VerifyStaffIdResponse::new(candidate, &verification)))
}

#[utoipa::path(
    get,
    path = "/staff",
    tag = "Staff",
    responses((status = 200, description = "All staff records", body = Vec<StaffRecord>)),
    security(("bearerAuth" = []))
)]
pub async fn list_staff(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<StaffRecord>>> {
    require_user_management(&state, &auth).await?;
    Ok(Json(state.staff.read().await.list()))
}

#[utoipa::path(
    post,
    path = "/staff",
    tag = "Staff",
    request_body = StaffCreateRequest,
    responses(
        (status = 201, description = "Staff id added", body = StaffRecord),
        (status = 409, description = "Custom id already registered"),
        (status = 422, description = "Invalid id or incomplete scope")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_staff(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<StaffCreateRequest>,
) -> AppResult<(StatusCode, Json<StaffRecord>)> {
    require_user_management(&state, &auth).await?;

    let mut staff = state.staff.write().await;
    let record = staff.add_staff_id(payload.into(), utc_now())?;
    state.save_staff(&staff).await?;

    log_activity(&state.event_bus, "created", Some(auth.user_id), &record);
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    put,
    path = "/staff/{id}",
    tag = "Staff",
    params(("id" = String, Path, description = "Staff id")),
    request_body = StaffUpdateRequest,
    responses(
        (status = 200, description = "Staff record updated", body = StaffRecord),
        (status = 404, description = "Unknown staff id")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_staff(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<StaffUpdateRequest>,
) -> AppResult<Json<StaffRecord>> {
    require_user_management(&state, &auth).await?;

    let now = utc_now();
    let mut staff = state.staff.write().await;
    let mut accounts = state.accounts.write().await;

    let old = staff
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("staff id {id} not found")))?;
    let record = staff.update_staff_id(&id, payload.into(), now)?;
    state.save_staff(&staff).await?;

    if let Some(account) = accounts.sync_staff_record(&record, now) {
        state.save_accounts(&accounts).await?;
        log_activity(&state.event_bus, "scope_synced", Some(auth.user_id), &account);
    }

    log_activity_with_context(&state.event_bus, "updated", Some(auth.user_id), &record, Some(&old), None);
    Ok(Json(record))
}

#[utoipa::path(
    delete,
    path = "/staff/{id}",
    tag = "Staff",
    params(("id" = String, Path, description = "Staff id")),
    responses(
        (status = 204, description = "Staff id deleted"),
        (status = 409, description = "Staff id is bound to an account")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_staff(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    require_user_management(&state, &auth).await?;

    let mut staff = state.staff.write().await;
    let accounts = state.accounts.read().await;
    let removed = staff.delete_staff_id(&id, &*accounts)?;
    state.save_staff(&staff).await?;

    log_activity(&state.event_bus, "deleted", Some(auth.user_id), &removed);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/staff/import",
    tag = "Staff",
    request_body(content = String, content_type = "text/csv", description = "name,role,region,district,customId"),
    responses((status = 200, description = "Per-row import outcome", body = ImportReport)),
    security(("bearerAuth" = []))
)]
pub async fn import_staff(State(state): State<AppState>, auth: AuthUser, body: String) -> AppResult<Json<ImportReport>> {
    require_user_management(&state, &auth).await?;

    let mut staff = state.staff.write().await;
    let report = import_csv(&mut staff, body.as_bytes(), utc_now());
    if !report.imported.is_empty() {
        state.save_staff(&staff).await?;
    }

    for record in &report.imported {
        log_activity(&state.event_bus, "imported", Some(auth.user_id), record);
    }
    Ok(Json(report))
}
