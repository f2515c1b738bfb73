use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

/// Canonical region or district name.
///
/// Names arrive from forms, CSV imports and the resource store in whatever case
/// the operator typed. They are trimmed, whitespace-collapsed and upper-cased once
/// here so that every comparison downstream is plain equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeName(String);

impl ScopeName {
    pub fn parse(raw: &str) -> Option<Self> {
        let canonical = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        if canonical.is_empty() {
            None
        } else {
            Some(Self(canonical))
        }
    }

    /// Empty or missing input both mean "not set".
    pub fn parse_opt(raw: Option<&str>) -> Option<Self> {
        raw.and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ScopeName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| "scope name must not be empty".to_string())
    }
}

impl From<ScopeName> for String {
    fn from(value: ScopeName) -> Self {
        value.0
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A region/district pair, used both for a subject's jurisdiction and for the
/// location of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Jurisdiction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<ScopeName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<ScopeName>,
}

impl Jurisdiction {
    pub fn new(region: Option<ScopeName>, district: Option<ScopeName>) -> Self {
        Self { region, district }
    }

    pub fn from_names(region: Option<&str>, district: Option<&str>) -> Self {
        Self::new(ScopeName::parse_opt(region), ScopeName::parse_opt(district))
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    fn same_region(&self, other: &Jurisdiction) -> bool {
        matches!((&self.region, &other.region), (Some(a), Some(b)) if a == b)
    }

    fn same_district(&self, other: &Jurisdiction) -> bool {
        matches!((&self.district, &other.district), (Some(a), Some(b)) if a == b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Asset,
    Inspection,
    LoadMonitoring,
    General,
}

impl ResourceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceCategory::Asset => "asset",
            ResourceCategory::Inspection => "inspection",
            ResourceCategory::LoadMonitoring => "load_monitoring",
            ResourceCategory::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Edit,
    Delete,
}

impl Action {
    fn index(self) -> usize {
        match self {
            Action::View => 0,
            Action::Edit => 1,
            Action::Delete => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeRule {
    Always,
    SameRegion,
    SameDistrict,
    Never,
}

use ScopeRule::{Always, Never, SameDistrict, SameRegion};

/// Rows follow `Role::index`, columns follow `Action::index` (view, edit, delete).
type RuleTable = [[ScopeRule; 3]; 5];

const STANDARD_RULES: RuleTable = [
    [SameDistrict, SameDistrict, Never],
    [SameDistrict, SameDistrict, SameDistrict],
    [SameRegion, SameRegion, SameRegion],
    [Always, Always, Always],
    [Always, Always, Always],
];

// Technicians may read load readings in their district but never change them.
const LOAD_MONITORING_RULES: RuleTable = [
    [SameDistrict, Never, Never],
    [SameDistrict, SameDistrict, SameDistrict],
    [SameRegion, SameRegion, SameRegion],
    [Always, Always, Always],
    [Always, Always, Always],
];

fn rules_for(category: ResourceCategory) -> &'static RuleTable {
    match category {
        ResourceCategory::LoadMonitoring => &LOAD_MONITORING_RULES,
        ResourceCategory::Asset | ResourceCategory::Inspection | ResourceCategory::General => {
            &STANDARD_RULES
        }
    }
}

/// Decides view/edit/delete eligibility on region/district scoped resources.
///
/// Absence of permission is always `false`; nothing here returns an error.
pub fn is_permitted(
    role: Option<Role>,
    subject: &Jurisdiction,
    category: ResourceCategory,
    action: Action,
    resource: &Jurisdiction,
) -> bool {
    let Some(role) = role else {
        return false;
    };

    match rules_for(category)[role.index()][action.index()] {
        Always => true,
        SameRegion => subject.same_region(resource),
        SameDistrict => subject.same_district(resource),
        Never => false,
    }
}

pub fn can_view(
    role: Option<Role>,
    subject: &Jurisdiction,
    category: ResourceCategory,
    resource: &Jurisdiction,
) -> bool {
    is_permitted(role, subject, category, Action::View, resource)
}

pub fn can_edit(
    role: Option<Role>,
    subject: &Jurisdiction,
    category: ResourceCategory,
    resource: &Jurisdiction,
) -> bool {
    is_permitted(role, subject, category, Action::Edit, resource)
}

pub fn can_delete(
    role: Option<Role>,
    subject: &Jurisdiction,
    category: ResourceCategory,
    resource: &Jurisdiction,
) -> bool {
    is_permitted(role, subject, category, Action::Delete, resource)
}
