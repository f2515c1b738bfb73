use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("password change required")]
    PasswordChangeRequired,
    #[error("too many login attempts, try again in {retry_after_minutes} minutes")]
    TooManyAttempts { retry_after_minutes: i64 },
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("staff id already in use: {0}")]
    DuplicateStaffId(String),
    #[error("invalid staff id: {0}")]
    InvalidStaffId(String),
    #[error("staff id {staff_id} does not match the claimed {field}")]
    StaffIdMismatch { staff_id: String, field: &'static str },
    #[error("a staff id is required for the {0} role")]
    StaffIdRequired(String),
    #[error("incomplete scope: {0}")]
    IncompleteScope(String),
    #[error("weak password: {0}")]
    WeakPassword(String),
    #[error("feature already exists: {0}")]
    DuplicateFeature(String),
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
    #[error("staff id {0} is bound to a user account")]
    StaffIdInUse(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn weak_password(message: impl Into<String>) -> Self {
        Self::WeakPassword(message.into())
    }

    pub fn incomplete_scope(message: impl Into<String>) -> Self {
        Self::IncompleteScope(message.into())
    }

    /// Stable snake_case identifier reported as `error` in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::AccountDisabled => "account_disabled",
            AppError::PasswordChangeRequired => "password_change_required",
            AppError::TooManyAttempts { .. } => "too_many_attempts",
            AppError::DuplicateEmail(_) => "duplicate_email",
            AppError::DuplicateStaffId(_) => "duplicate_staff_id",
            AppError::InvalidStaffId(_) => "invalid_staff_id",
            AppError::StaffIdMismatch { .. } => "staff_id_mismatch",
            AppError::StaffIdRequired(_) => "staff_id_required",
            AppError::IncompleteScope(_) => "incomplete_scope",
            AppError::WeakPassword(_) => "weak_password",
            AppError::DuplicateFeature(_) => "duplicate_feature",
            AppError::UnknownFeature(_) => "unknown_feature",
            AppError::StaffIdInUse(_) => "staff_id_in_use",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AccountDisabled | AppError::PasswordChangeRequired => StatusCode::FORBIDDEN,
            AppError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DuplicateEmail(_)
            | AppError::DuplicateStaffId(_)
            | AppError::DuplicateFeature(_)
            | AppError::StaffIdInUse(_) => StatusCode::CONFLICT,
            AppError::InvalidStaffId(_)
            | AppError::StaffIdMismatch { .. }
            | AppError::StaffIdRequired(_)
            | AppError::IncompleteScope(_)
            | AppError::WeakPassword(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UnknownFeature(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let payload = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
