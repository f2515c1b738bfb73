use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authz::{Role, ScopeName};
use crate::staff::{NewStaff, StaffInfo, StaffUpdate, StaffVerification};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StaffCreateRequest {
    #[schema(example = "Abena Owusu")]
    pub name: String,
    pub role: Role,
    #[schema(example = "ACCRA EAST REGION")]
    pub region: Option<String>,
    #[schema(example = "MAKOLA")]
    pub district: Option<String>,
    /// 6-10 letters or digits; omit to allocate the next ECG### code
    pub custom_id: Option<String>,
}

impl From<StaffCreateRequest> for NewStaff {
    fn from(req: StaffCreateRequest) -> Self {
        NewStaff {
            name: req.name,
            role: Some(req.role),
            region: ScopeName::parse_opt(req.region.as_deref()),
            district: ScopeName::parse_opt(req.district.as_deref()),
            custom_id: req.custom_id,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StaffUpdateRequest {
    pub name: String,
    pub role: Role,
    pub region: Option<String>,
    pub district: Option<String>,
}

impl From<StaffUpdateRequest> for StaffUpdate {
    fn from(req: StaffUpdateRequest) -> Self {
        StaffUpdate {
            name: req.name,
            role: req.role,
            region: ScopeName::parse_opt(req.region.as_deref()),
            district: ScopeName::parse_opt(req.district.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Registered,
    AvailableCustomId,
    Invalid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyStaffIdResponse {
    pub staff_id: String,
    pub valid: bool,
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<StaffInfo>,
}

impl VerifyStaffIdResponse {
    pub fn new(staff_id: String, verification: &StaffVerification) -> Self {
        let status = match verification {
            StaffVerification::Registered(_) => VerificationStatus::Registered,
            StaffVerification::AvailableCustomId => VerificationStatus::AvailableCustomId,
            StaffVerification::Invalid => VerificationStatus::Invalid,
        };
        Self {
            staff_id,
            valid: verification.is_valid(),
            status,
            info: verification.staff_info(),
        }
    }
}
