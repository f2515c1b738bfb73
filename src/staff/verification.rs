use serde::Serialize;
use utoipa::ToSchema;

use super::{custom_id_pattern, generated_id_pattern, scope_for_role, StaffDirectory};
use crate::authz::{Jurisdiction, Role, ScopeName};
use crate::errors::{AppError, AppResult};

/// Identity attributes a directory entry pre-assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StaffInfo {
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub region: Option<ScopeName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub district: Option<ScopeName>,
}

/// Outcome of checking a candidate staff id against the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffVerification {
    /// The id is in the directory.
    Registered(StaffInfo),
    /// Well-formed custom id that nobody has registered yet. It carries no identity;
    /// the caller collects name, role and scope from the user.
    AvailableCustomId,
    /// Unknown generated id or malformed custom id.
    Invalid,
}

impl StaffVerification {
    pub fn is_valid(&self) -> bool {
        !matches!(self, StaffVerification::Invalid)
    }

    /// `AvailableCustomId` reports an empty technician placeholder.
    pub fn staff_info(&self) -> Option<StaffInfo> {
        match self {
            StaffVerification::Registered(info) => Some(info.clone()),
            StaffVerification::AvailableCustomId => Some(StaffInfo {
                name: String::new(),
                role: Role::Technician,
                region: None,
                district: None,
            }),
            StaffVerification::Invalid => None,
        }
    }
}

impl StaffDirectory {
    pub fn verify_staff_id(&self, candidate: &str) -> StaffVerification {
        if let Some(record) = self.get(candidate) {
            return StaffVerification::Registered(StaffInfo {
                name: record.name.clone(),
                role: record.role,
                region: record.region.clone(),
                district: record.district.clone(),
            });
        }

        if generated_id_pattern().is_match(candidate) || !custom_id_pattern().is_match(candidate) {
            return StaffVerification::Invalid;
        }

        StaffVerification::AvailableCustomId
    }
}

/// What a signup form claims about the new user.
#[derive(Debug, Clone)]
pub struct SignupClaim {
    pub name: String,
    pub role: Role,
    pub region: Option<ScopeName>,
    pub district: Option<ScopeName>,
    pub staff_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffBinding {
    /// No staff id (global engineers only).
    Unbound,
    /// Bound to an existing directory entry.
    Existing(String),
    /// Bound to a custom id that must be registered alongside the account.
    NewCustom(String),
}

impl StaffBinding {
    pub fn staff_id(&self) -> Option<&str> {
        match self {
            StaffBinding::Unbound => None,
            StaffBinding::Existing(id) | StaffBinding::NewCustom(id) => Some(id),
        }
    }
}

/// The identity an account is created with once the claim checks out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub name: String,
    pub role: Role,
    pub jurisdiction: Jurisdiction,
    pub binding: StaffBinding,
}

/// Cross-checks a signup claim against the staff directory.
///
/// Role, region and district disagreements with a directory entry are hard
/// failures. A differing name is not: the directory name replaces the one typed
/// into the form and the substitution is logged. Keep that asymmetry.
pub fn cross_validate(directory: &StaffDirectory, claim: &SignupClaim) -> AppResult<VerifiedIdentity> {
    if claim.role == Role::SystemAdmin {
        return Err(AppError::forbidden("system_admin accounts cannot be self-registered"));
    }

    let staff_id = claim
        .staff_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let mut name = claim.name.trim().to_string();

    let binding = match staff_id {
        None => {
            if claim.role != Role::GlobalEngineer {
                return Err(AppError::StaffIdRequired(claim.role.to_string()));
            }
            StaffBinding::Unbound
        }
        Some(id) => match directory.verify_staff_id(id) {
            StaffVerification::Invalid => return Err(AppError::InvalidStaffId(id.to_string())),
            StaffVerification::AvailableCustomId => StaffBinding::NewCustom(id.to_string()),
            StaffVerification::Registered(info) => {
                check_field(id, "role", Some(&info.role), Some(&claim.role))?;
                check_field(id, "region", info.region.as_ref(), claim.region.as_ref())?;
                check_field(id, "district", info.district.as_ref(), claim.district.as_ref())?;

                if !info.name.is_empty() && info.name != name {
                    tracing::info!(
                        staff_id = %id,
                        claimed = %name,
                        directory = %info.name,
                        "signup name differs from staff directory, using directory name"
                    );
                    name = info.name;
                }
                StaffBinding::Existing(id.to_string())
            }
        },
    };

    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let jurisdiction = scope_for_role(claim.role, claim.region.clone(), claim.district.clone())?;

    Ok(VerifiedIdentity {
        name,
        role: claim.role,
        jurisdiction,
        binding,
    })
}

// A field the directory leaves unset places no constraint on the claim.
fn check_field<T: PartialEq>(
    staff_id: &str,
    field: &'static str,
    directory: Option<&T>,
    claimed: Option<&T>,
) -> AppResult<()> {
    match directory {
        Some(expected) if claimed != Some(expected) => Err(AppError::StaffIdMismatch {
            staff_id: staff_id.to_string(),
            field,
        }),
        _ => Ok(()),
    }
}
