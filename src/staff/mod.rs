//! Staff directory - pre-issued staff identities and their lifecycle
//!
//! Staff IDs come in two shapes:
//! - generated `ECG###` codes, allocated from a monotonic sequence
//! - custom 6-10 character uppercase alphanumeric codes entered by an administrator
//!
//! A record bound to a user account cannot be deleted.

mod import;
mod verification;

pub use import::{import_csv, ImportReport, RowError};
pub use verification::{cross_validate, SignupClaim, StaffBinding, StaffInfo, StaffVerification, VerifiedIdentity};

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authz::{Jurisdiction, Role, ScopeName, ScopeRequirement};
use crate::errors::{AppError, AppResult};
use crate::events::Loggable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StaffRecord {
    #[schema(example = "ECG001")]
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "ACCRA EAST REGION")]
    pub region: Option<ScopeName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "MAKOLA")]
    pub district: Option<ScopeName>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffRecord {
    pub fn jurisdiction(&self) -> Jurisdiction {
        Jurisdiction::new(self.region.clone(), self.district.clone())
    }
}

impl Loggable for StaffRecord {
    fn entity_type() -> &'static str {
        "staff_id"
    }

    fn subject_id(&self) -> String {
        self.id.clone()
    }
}

/// Input for a new directory entry. Without `custom_id` the next `ECG###` code is used.
#[derive(Debug, Clone, Default)]
pub struct NewStaff {
    pub name: String,
    pub role: Option<Role>,
    pub region: Option<ScopeName>,
    pub district: Option<ScopeName>,
    pub custom_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StaffUpdate {
    pub name: String,
    pub role: Role,
    pub region: Option<ScopeName>,
    pub district: Option<ScopeName>,
}

/// Answers whether a staff id is referenced by some user account.
pub trait StaffIdBindings {
    fn is_bound(&self, staff_id: &str) -> bool;
}

pub(crate) fn generated_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^ECG(\d{3})$").expect("static pattern"))
}

pub(crate) fn custom_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{6,10}$").expect("static pattern"))
}

/// Checks that the scope fields a role requires are present and drops the ones it
/// must not carry (a regional engineer has no district, a global engineer no scope).
pub fn scope_for_role(
    role: Role,
    region: Option<ScopeName>,
    district: Option<ScopeName>,
) -> AppResult<Jurisdiction> {
    match role.scope_requirement() {
        ScopeRequirement::RegionAndDistrict => match (region, district) {
            (Some(region), Some(district)) => Ok(Jurisdiction::new(Some(region), Some(district))),
            _ => Err(AppError::incomplete_scope(format!(
                "{role} requires both region and district"
            ))),
        },
        ScopeRequirement::Region => match region {
            Some(region) => Ok(Jurisdiction::new(Some(region), None)),
            None => Err(AppError::incomplete_scope(format!("{role} requires a region"))),
        },
        ScopeRequirement::Unrestricted => Ok(Jurisdiction::unrestricted()),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffDirectory {
    records: BTreeMap<String, StaffRecord>,
    /// Highest generated sequence number handed out so far.
    #[serde(default)]
    sequence: u32,
}

impl StaffDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&StaffRecord> {
        self.records.get(id)
    }

    pub fn list(&self) -> Vec<StaffRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add_staff_id(&mut self, new: NewStaff, now: DateTime<Utc>) -> AppResult<StaffRecord> {
        let name = required_name(&new.name)?;
        let role = staff_role(new.role)?;
        let jurisdiction = scope_for_role(role, new.region, new.district)?;

        let id = match new.custom_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(custom) => self.claim_custom_id(custom)?,
            None => self.next_generated_id(),
        };

        let record = StaffRecord {
            id: id.clone(),
            name,
            role,
            region: jurisdiction.region,
            district: jurisdiction.district,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(id, record.clone());

        tracing::info!(staff_id = %record.id, role = %record.role, "staff id added");
        Ok(record)
    }

    pub fn update_staff_id(&mut self, id: &str, update: StaffUpdate, now: DateTime<Utc>) -> AppResult<StaffRecord> {
        let name = required_name(&update.name)?;
        let role = staff_role(Some(update.role))?;
        let jurisdiction = scope_for_role(role, update.region, update.district)?;

        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("staff id {id} not found")))?;

        record.name = name;
        record.role = role;
        record.region = jurisdiction.region;
        record.district = jurisdiction.district;
        record.updated_at = now;

        Ok(record.clone())
    }

    pub fn delete_staff_id(&mut self, id: &str, bindings: &impl StaffIdBindings) -> AppResult<StaffRecord> {
        if !self.records.contains_key(id) {
            return Err(AppError::not_found(format!("staff id {id} not found")));
        }
        if bindings.is_bound(id) {
            return Err(AppError::StaffIdInUse(id.to_string()));
        }

        let removed = self
            .records
            .remove(id)
            .ok_or_else(|| AppError::not_found(format!("staff id {id} not found")))?;
        tracing::info!(staff_id = %id, "staff id deleted");
        Ok(removed)
    }

    fn claim_custom_id(&self, raw: &str) -> AppResult<String> {
        let id = raw.to_uppercase();
        if !custom_id_pattern().is_match(&id) {
            return Err(AppError::InvalidStaffId(format!(
                "{raw}: custom ids are 6-10 uppercase letters or digits"
            )));
        }
        if generated_id_pattern().is_match(&id) {
            return Err(AppError::InvalidStaffId(format!(
                "{raw}: the ECG### form is reserved for generated ids"
            )));
        }
        if self.records.contains_key(&id) {
            return Err(AppError::DuplicateStaffId(id));
        }
        Ok(id)
    }

    // Allocates past both the stored high-water mark and any ECG code already present,
    // so codes freed by a delete are never handed out again.
    fn next_generated_id(&mut self) -> String {
        let highest_present = self
            .records
            .keys()
            .filter_map(|id| generated_id_pattern().captures(id))
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        let mut next = self.sequence.max(highest_present) + 1;
        while self.records.contains_key(&format!("ECG{next:03}")) {
            next += 1;
        }
        self.sequence = next;
        format!("ECG{next:03}")
    }
}

fn required_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    Ok(name.to_string())
}

fn staff_role(role: Option<Role>) -> AppResult<Role> {
    match role {
        Some(role) if role.is_ranked() => Ok(role),
        Some(role) => Err(AppError::bad_request(format!("{role} cannot hold a staff id"))),
        None => Err(AppError::bad_request("role is required")),
    }
}
