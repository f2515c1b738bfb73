use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role tags carried by staff records and user accounts.
///
/// The four engineering roles are ranked; `SystemAdmin` sits outside the ranking
/// and passes every check. "No role yet" is modelled as `Option<Role>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Technician,
    DistrictEngineer,
    RegionalEngineer,
    GlobalEngineer,
    SystemAdmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Technician,
        Role::DistrictEngineer,
        Role::RegionalEngineer,
        Role::GlobalEngineer,
        Role::SystemAdmin,
    ];

    /// Numeric rank, defined for the four ranked roles only.
    pub fn seniority(self) -> Option<u8> {
        match self {
            Role::Technician => Some(1),
            Role::DistrictEngineer => Some(2),
            Role::RegionalEngineer => Some(3),
            Role::GlobalEngineer => Some(4),
            Role::SystemAdmin => None,
        }
    }

    pub fn is_ranked(self) -> bool {
        self.seniority().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Technician => "technician",
            Role::DistrictEngineer => "district_engineer",
            Role::RegionalEngineer => "regional_engineer",
            Role::GlobalEngineer => "global_engineer",
            Role::SystemAdmin => "system_admin",
        }
    }

    /// Which scope fields a holder of this role must carry.
    pub fn scope_requirement(self) -> ScopeRequirement {
        match self {
            Role::Technician | Role::DistrictEngineer => ScopeRequirement::RegionAndDistrict,
            Role::RegionalEngineer => ScopeRequirement::Region,
            Role::GlobalEngineer | Role::SystemAdmin => ScopeRequirement::Unrestricted,
        }
    }

    /// Stable index into per-role lookup tables.
    pub(crate) fn index(self) -> usize {
        match self {
            Role::Technician => 0,
            Role::DistrictEngineer => 1,
            Role::RegionalEngineer => 2,
            Role::GlobalEngineer => 3,
            Role::SystemAdmin => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRequirement {
    RegionAndDistrict,
    Region,
    Unrestricted,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Coarse "at least this senior" check.
///
/// Fails closed when either side is unset. `SystemAdmin` always passes; any other
/// subject compared against `SystemAdmin` fails because that role has no rank.
pub fn meets_minimum(subject: Option<Role>, required: Option<Role>) -> bool {
    let (Some(subject), Some(required)) = (subject, required) else {
        return false;
    };

    if subject == Role::SystemAdmin {
        return true;
    }

    match (subject.seniority(), required.seniority()) {
        (Some(have), Some(need)) => have >= need,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKED: [Role; 4] = [
        Role::Technician,
        Role::DistrictEngineer,
        Role::RegionalEngineer,
        Role::GlobalEngineer,
    ];

    #[test]
    fn ranked_roles_compare_by_seniority() {
        for a in RANKED {
            for b in RANKED {
                assert_eq!(
                    meets_minimum(Some(a), Some(b)),
                    a.seniority() >= b.seniority(),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn system_admin_passes_everything() {
        for required in Role::ALL {
            assert!(meets_minimum(Some(Role::SystemAdmin), Some(required)));
        }
    }

    #[test]
    fn unset_roles_fail_closed() {
        for role in Role::ALL {
            assert!(!meets_minimum(None, Some(role)));
            assert!(!meets_minimum(Some(role), None));
        }
        assert!(!meets_minimum(None, None));
    }

    #[test]
    fn only_admin_meets_admin_requirement() {
        assert!(!meets_minimum(Some(Role::GlobalEngineer), Some(Role::SystemAdmin)));
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("district_engineer".parse::<Role>(), Ok(Role::DistrictEngineer));
        assert_eq!(" technician ".parse::<Role>(), Ok(Role::Technician));
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(
            serde_json::to_string(&Role::GlobalEngineer).unwrap(),
            "\"global_engineer\""
        );
    }
}
