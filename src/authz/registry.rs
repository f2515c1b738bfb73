use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::features;
use super::role::Role;
use crate::errors::{AppError, AppResult};

/// Identifier of a gated feature, e.g. `user_management`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureKey(String);

fn feature_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{1,63}$").expect("static pattern"))
}

impl FeatureKey {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let key = raw.trim();
        if feature_key_pattern().is_match(key) {
            Ok(Self(key.to_string()))
        } else {
            Err(AppError::bad_request(format!(
                "feature key must be lowercase snake_case (2-64 chars), got {raw:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FeatureKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).map_err(|err| err.to_string())
    }
}

impl From<FeatureKey> for String {
    fn from(value: FeatureKey) -> Self {
        value.0
    }
}

impl Borrow<str> for FeatureKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type FeaturePermissions = BTreeMap<FeatureKey, BTreeSet<Role>>;

/// Runtime-mutable mapping from feature to the roles allowed to use it.
///
/// Membership is exact: a role not listed for a feature is denied even if it is
/// more senior than a listed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRegistry {
    features: FeaturePermissions,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::seeded()
    }
}

impl FeatureRegistry {
    pub fn empty() -> Self {
        Self {
            features: BTreeMap::new(),
        }
    }

    /// Registry with the built-in features every deployment starts from.
    pub fn seeded() -> Self {
        use Role::*;

        let everyone = [Technician, DistrictEngineer, RegionalEngineer, GlobalEngineer, SystemAdmin];
        let seeds: [(&str, &[Role]); 7] = [
            (features::ASSET_MANAGEMENT, &everyone),
            (features::INSPECTION_MANAGEMENT, &everyone),
            (features::LOAD_MONITORING, &everyone),
            (features::FAULT_MANAGEMENT, &everyone),
            (
                features::ANALYTICS_DASHBOARD,
                &[DistrictEngineer, RegionalEngineer, GlobalEngineer, SystemAdmin],
            ),
            (features::USER_MANAGEMENT, &[GlobalEngineer, SystemAdmin]),
            (features::SYSTEM_CONFIGURATION, &[SystemAdmin]),
        ];

        let features = seeds
            .into_iter()
            .map(|(key, roles)| (FeatureKey(key.to_string()), roles.iter().copied().collect()))
            .collect();

        Self { features }
    }

    /// Unknown features and unset roles are denied rather than reported.
    pub fn can_access(&self, role: Option<Role>, feature: &str) -> bool {
        let Some(role) = role else {
            return false;
        };

        self.features
            .get(feature)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    pub fn roles_for(&self, feature: &FeatureKey) -> Option<&BTreeSet<Role>> {
        self.features.get(feature)
    }

    pub fn add_feature(&mut self, key: FeatureKey, roles: impl IntoIterator<Item = Role>) -> AppResult<()> {
        if self.features.contains_key(&key) {
            return Err(AppError::DuplicateFeature(key.to_string()));
        }

        self.features.insert(key, roles.into_iter().collect());
        Ok(())
    }

    /// Replaces the role set wholesale.
    pub fn update_feature_permissions(
        &mut self,
        key: &FeatureKey,
        roles: impl IntoIterator<Item = Role>,
    ) -> AppResult<()> {
        let entry = self
            .features
            .get_mut(key)
            .ok_or_else(|| AppError::UnknownFeature(key.to_string()))?;
        *entry = roles.into_iter().collect();
        Ok(())
    }

    pub fn remove_feature(&mut self, key: &FeatureKey) -> AppResult<BTreeSet<Role>> {
        self.features
            .remove(key)
            .ok_or_else(|| AppError::UnknownFeature(key.to_string()))
    }

    /// Owned snapshot; changes to it do not reach the registry.
    pub fn list_all(&self) -> FeaturePermissions {
        self.features.clone()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
