use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{AccessRequirement, GateDecision};
use crate::errors::{AppError, AppResult};
use crate::jwt::MaybeAuthUser;
use crate::models::access::AccessCheckResponse;

pub fn routes() -> Router<AppState> {
    Router::new().route("/check", post(check_access))
}

/// Runs the access gate for a route requirement. Without a live session the
/// answer is a redirect to the login page rather than an error; a session that
/// still owes a password change is redirected to the unauthorized page.
#[utoipa::path(
    post,
    path = "/access/check",
    tag = "Access",
    request_body = AccessRequirement,
    responses((status = 200, description = "Gate decision", body = AccessCheckResponse))
)]
pub async fn check_access(
    State(state): State<AppState>,
    auth: Result<MaybeAuthUser, AppError>,
    Json(requirement): Json<AccessRequirement>,
) -> AppResult<Json<AccessCheckResponse>> {
    let decision = match auth {
        Ok(MaybeAuthUser(user)) => {
            let principal = user.as_ref().map(|user| &user.principal);
            state.gate.evaluate(principal, &requirement).await
        }
        // Pending password change: nothing but the account pages is reachable.
        Err(AppError::PasswordChangeRequired) => GateDecision::RedirectToUnauthorized,
        Err(err) => return Err(err),
    };
    Ok(Json(AccessCheckResponse::from(decision)))
}
