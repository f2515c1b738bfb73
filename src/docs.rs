use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::Value;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{AccessRequirement, Action, GateDecision, ResourceCategory, Role, ScopeName};
use crate::models;
use crate::routes;
use crate::staff::{ImportReport, RowError, StaffInfo, StaffRecord};

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::signup,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::auth::change_password,
        routes::auth::rotate_csrf,
        routes::staff::verify_staff_id,
        routes::staff::list_staff,
        routes::staff::create_staff,
        routes::staff::update_staff,
        routes::staff::delete_staff,
        routes::staff::import_staff,
        routes::users::list_users,
        routes::users::add_user,
        routes::users::reset_password,
        routes::users::disable_user,
        routes::users::enable_user,
        routes::users::delete_user,
        routes::features::list_features,
        routes::features::create_feature,
        routes::features::update_feature,
        routes::features::delete_feature,
        routes::features::feature_access,
        routes::access::check_access
    ),
    components(
        schemas(
            Role,
            ScopeName,
            ResourceCategory,
            Action,
            AccessRequirement,
            GateDecision,
            StaffRecord,
            StaffInfo,
            ImportReport,
            RowError,
            routes::health::HealthResponse,
            models::user::User,
            models::user::SignupRequest,
            models::user::LoginRequest,
            models::user::AuthResponse,
            models::user::CsrfResponse,
            models::user::ChangePasswordRequest,
            models::user::AddUserRequest,
            models::user::AddUserResponse,
            models::user::ResetPasswordRequest,
            models::user::MessageResponse,
            models::staff::StaffCreateRequest,
            models::staff::StaffUpdateRequest,
            models::staff::VerificationStatus,
            models::staff::VerifyStaffIdResponse,
            models::feature::Feature,
            models::feature::FeatureCreateRequest,
            models::feature::FeatureUpdateRequest,
            models::feature::FeatureAccessResponse,
            models::access::AccessCheckResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness and database probe"),
        (name = "Auth", description = "Signup, login and session management"),
        (name = "Staff", description = "Staff id directory"),
        (name = "Users", description = "Account administration"),
        (name = "Features", description = "Feature permission registry"),
        (name = "Access", description = "Route access decisions")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
    doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json: Arc<Value> = Arc::new(serde_json::to_value(&doc).unwrap_or_default());

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}
