use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum::http::Method;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppError;
use crate::utils::utc_now;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const DEFAULT_SESSION_HOURS: i64 = 8;

// Reachable while a password change is pending.
const PASSWORD_CHANGE_PATHS: [&str; 4] = ["/auth/me", "/auth/logout", "/auth/change-password", "/auth/csrf"];

/// Signing keys for session tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub session_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: Vec<u8>, session_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret),
            session_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("SESSION_SECRET").map_err(|_| AppError::configuration("SESSION_SECRET not set"))?;
        let session_hours = std::env::var("SESSION_TTL_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_SESSION_HOURS))
            .map_err(|_| AppError::configuration("SESSION_TTL_HOURS must be a valid integer"))?;

        Ok(Self::new(secret.into_bytes(), session_hours))
    }

    pub fn encode(
        &self,
        user_id: Uuid,
        session_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id,
            sid: session_id.to_string(),
            exp: expires_at.timestamp() as usize,
            iat: issued_at.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: String,
    pub exp: usize,
    pub iat: usize,
}

/// The caller behind a live session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub session_id: String,
    pub principal: Principal,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let accounts = state.accounts.read().await;
        let (session, account) = accounts.validate_session(&state.jwt, token, utc_now())?;

        if is_mutating(&parts.method) {
            let presented = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok());
            if presented != Some(session.csrf_token.as_str()) {
                return Err(AppError::forbidden("missing or invalid CSRF token"));
            }
        }

        // Nested routers see a stripped URI; match on the original one.
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        if account.must_change_password && !PASSWORD_CHANGE_PATHS.contains(&path.as_str()) {
            return Err(AppError::PasswordChangeRequired);
        }

        Ok(AuthUser {
            user_id: account.id,
            session_id: session.id.clone(),
            principal: account.principal(),
        })
    }
}

/// Like `AuthUser`, but a missing, expired or revoked session yields `None`.
/// CSRF and password-change rejections still apply; callers that must answer
/// with a decision instead take `Result<MaybeAuthUser, AppError>`.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(axum::http::header::AUTHORIZATION) {
            return Ok(MaybeAuthUser(None));
        }
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(AppError::Unauthorized(_) | AppError::Token(_) | AppError::AccountDisabled) => Ok(MaybeAuthUser(None)),
            Err(err) => Err(err),
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}
