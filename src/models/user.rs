use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::accounts::{NewUser, Signup, UserAccount};
use crate::authz::Role;

/// Account as returned by the API; credential fields are never included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    pub must_change_password: bool,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&UserAccount> for User {
    fn from(account: &UserAccount) -> Self {
        User {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            role: account.role,
            region: account.region.as_ref().map(|r| r.to_string()),
            district: account.district.as_ref().map(|d| d.to_string()),
            staff_id: account.staff_id.clone(),
            must_change_password: account.must_change_password,
            disabled: account.disabled,
            created_at: account.created_at,
            updated_at: account.updated_at,
            last_login_at: account.last_login_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    #[schema(example = "abena.owusu@example.com")]
    pub email: String,
    #[schema(example = "Passw0rd")]
    pub password: String,
    #[schema(example = "Abena Owusu")]
    pub name: String,
    pub role: Role,
    #[schema(example = "ACCRA EAST REGION")]
    pub region: Option<String>,
    #[schema(example = "MAKOLA")]
    pub district: Option<String>,
    #[schema(example = "ECG001")]
    pub staff_id: Option<String>,
}

impl From<SignupRequest> for Signup {
    fn from(req: SignupRequest) -> Self {
        Signup {
            email: req.email,
            password: req.password,
            name: req.name,
            role: req.role,
            region: req.region,
            district: req.district,
            staff_id: req.staff_id,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "abena.owusu@example.com")]
    pub email: String,
    #[schema(example = "Passw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token for the Authorization header
    pub token: String,
    /// Echo in `x-csrf-token` on mutating requests
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CsrfResponse {
    pub csrf_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddUserRequest {
    #[schema(example = "kofi.mensah@example.com")]
    pub email: String,
    #[schema(example = "Kofi Mensah")]
    pub name: String,
    pub role: Role,
    pub region: Option<String>,
    pub district: Option<String>,
    pub staff_id: Option<String>,
}

impl From<AddUserRequest> for NewUser {
    fn from(req: AddUserRequest) -> Self {
        NewUser {
            email: req.email,
            name: req.name,
            role: req.role,
            region: req.region,
            district: req.district,
            staff_id: req.staff_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddUserResponse {
    pub user: User,
    /// Shown once; the user must replace it after the first login
    pub temp_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
