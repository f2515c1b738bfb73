use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{
    AuthResponse, ChangePasswordRequest, CsrfResponse, LoginRequest, MessageResponse, SignupRequest, User,
};
use crate::utils::utc_now;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/csrf", post(rotate_csrf))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthResponse),
        (status = 403, description = "system_admin cannot self-register"),
        (status = 409, description = "Email or staff id already in use"),
        (status = 422, description = "Staff id, scope or password rejected")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let now = utc_now();
    let mut staff = state.staff.write().await;
    let mut accounts = state.accounts.write().await;

    let staff_before = staff.len();
    let (session, account) = accounts.signup(&mut staff, &state.jwt, payload.into(), now)?;

    if staff.len() != staff_before {
        state.save_staff(&staff).await?;
        if let Some(record) = account.staff_id.as_deref().and_then(|id| staff.get(id)) {
            log_activity(&state.event_bus, "created", Some(account.id), record);
        }
    }
    state.save_accounts(&accounts).await?;

    log_activity_with_context(
        &state.event_bus,
        "registered",
        Some(account.id),
        &account,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: session.token,
            csrf_token: session.csrf_token,
            expires_at: session.expires_at,
            user: User::from(&account),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let mut accounts = state.accounts.write().await;
    let (session, account) = accounts.login(&state.jwt, &payload.email, &payload.password, utc_now())?;
    state.save_accounts(&accounts).await?;

    log_activity_with_context(
        &state.event_bus,
        "login",
        Some(account.id),
        &account,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(AuthResponse {
        token: session.token,
        csrf_token: session.csrf_token,
        expires_at: session.expires_at,
        user: User::from(&account),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let accounts = state.accounts.read().await;
    let account = accounts
        .get(auth.user_id)
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(User::from(account)))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Session revoked", body = MessageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    let mut accounts = state.accounts.write().await;
    accounts.logout(&auth.session_id);
    state.save_accounts(&accounts).await?;

    if let Some(account) = accounts.get(auth.user_id) {
        log_activity(&state.event_bus, "logout", Some(auth.user_id), account);
    }

    Ok(Json(MessageResponse::new("Logged out")))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "Auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = User),
        (status = 401, description = "Current password is wrong"),
        (status = 422, description = "New password too weak")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<User>> {
    let mut accounts = state.accounts.write().await;
    let account = accounts.change_password(auth.user_id, &payload.current_password, &payload.new_password, utc_now())?;
    state.save_accounts(&accounts).await?;

    log_activity(&state.event_bus, "password_changed", Some(auth.user_id), &account);
    Ok(Json(User::from(&account)))
}

#[utoipa::path(
    post,
    path = "/auth/csrf",
    tag = "Auth",
    responses((status = 200, description = "New CSRF token for this session", body = CsrfResponse)),
    security(("bearerAuth" = []))
)]
pub async fn rotate_csrf(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<CsrfResponse>> {
    let mut accounts = state.accounts.write().await;
    let session = accounts.rotate_csrf(&auth.session_id, utc_now())?;
    state.save_accounts(&accounts).await?;

    Ok(Json(CsrfResponse {
        csrf_token: session.csrf_token,
    }))
}
