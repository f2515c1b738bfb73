use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::principal::Principal;
use super::registry::FeatureRegistry;
use super::role::{meets_minimum, Role};
use super::scope::{self, Action, Jurisdiction, ResourceCategory, ScopeName};
use super::AuthzMode;
use crate::errors::{AppError, AppResult};

/// Resolves where a resource lives so scoped checks can run against it.
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    async fn locate(&self, category: ResourceCategory, resource_id: &str) -> AppResult<Option<Jurisdiction>>;
}

/// In-memory lookup, for tests and for embedding callers that already hold the data.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceLookup {
    locations: HashMap<(ResourceCategory, String), Jurisdiction>,
}

impl StaticResourceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: ResourceCategory, resource_id: &str, location: Jurisdiction) -> Self {
        self.locations.insert((category, resource_id.to_string()), location);
        self
    }
}

#[async_trait]
impl ResourceLookup for StaticResourceLookup {
    async fn locate(&self, category: ResourceCategory, resource_id: &str) -> AppResult<Option<Jurisdiction>> {
        Ok(self.locations.get(&(category, resource_id.to_string())).cloned())
    }
}

/// What a navigation or API call needs before it may proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessRequirement {
    Authenticated,
    MinimumRole { role: Role },
    Feature { feature: String },
    SystemAdmin,
    Scoped {
        category: ResourceCategory,
        action: Action,
        #[serde(default)]
        region: Option<ScopeName>,
        #[serde(default)]
        district: Option<ScopeName>,
    },
    Resource {
        category: ResourceCategory,
        resource_id: String,
        action: Action,
    },
}

impl AccessRequirement {
    pub fn feature(feature: &str) -> Self {
        Self::Feature {
            feature: feature.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    RedirectToLogin,
    RedirectToUnauthorized,
}

impl GateDecision {
    pub fn is_allowed(self) -> bool {
        self == GateDecision::Allow
    }

    pub fn location(self) -> Option<&'static str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::RedirectToLogin => Some("/login"),
            GateDecision::RedirectToUnauthorized => Some("/unauthorized"),
        }
    }
}

/// Composes role seniority, the feature registry and the scoped authorizer into a
/// single allow/redirect decision.
#[derive(Clone)]
pub struct AccessGate {
    registry: Arc<RwLock<FeatureRegistry>>,
    lookup: Arc<dyn ResourceLookup>,
    mode: AuthzMode,
}

impl AccessGate {
    pub fn new(registry: Arc<RwLock<FeatureRegistry>>, lookup: Arc<dyn ResourceLookup>, mode: AuthzMode) -> Self {
        Self { registry, lookup, mode }
    }

    pub fn mode(&self) -> AuthzMode {
        self.mode
    }

    pub async fn evaluate(&self, principal: Option<&Principal>, requirement: &AccessRequirement) -> GateDecision {
        let Some(principal) = principal else {
            return GateDecision::RedirectToLogin;
        };

        if self.mode == AuthzMode::Off {
            return GateDecision::Allow;
        }

        if self.is_satisfied(principal, requirement).await {
            return GateDecision::Allow;
        }

        match self.mode {
            AuthzMode::Advisory => {
                tracing::warn!(
                    user_id = %principal.user_id,
                    requirement = ?requirement,
                    "access would be denied (advisory mode)"
                );
                GateDecision::Allow
            }
            _ => {
                tracing::debug!(
                    user_id = %principal.user_id,
                    requirement = ?requirement,
                    "access denied"
                );
                GateDecision::RedirectToUnauthorized
            }
        }
    }

    /// Evaluates and turns a redirect into the matching API error.
    pub async fn require(&self, principal: &Principal, requirement: &AccessRequirement) -> AppResult<()> {
        match self.evaluate(Some(principal), requirement).await {
            GateDecision::Allow => Ok(()),
            GateDecision::RedirectToLogin => Err(AppError::unauthorized("login required")),
            GateDecision::RedirectToUnauthorized => Err(AppError::forbidden(describe(requirement))),
        }
    }

    async fn is_satisfied(&self, principal: &Principal, requirement: &AccessRequirement) -> bool {
        match requirement {
            AccessRequirement::Authenticated => true,
            AccessRequirement::MinimumRole { role } => meets_minimum(principal.role, Some(*role)),
            AccessRequirement::SystemAdmin => principal.is_system_admin(),
            AccessRequirement::Feature { feature } => {
                self.registry.read().await.can_access(principal.role, feature)
            }
            AccessRequirement::Scoped {
                category,
                action,
                region,
                district,
            } => {
                let location = Jurisdiction::new(region.clone(), district.clone());
                scope::is_permitted(principal.role, &principal.jurisdiction, *category, *action, &location)
            }
            AccessRequirement::Resource {
                category,
                resource_id,
                action,
            } => match self.lookup.locate(*category, resource_id).await {
                Ok(Some(location)) => {
                    scope::is_permitted(principal.role, &principal.jurisdiction, *category, *action, &location)
                }
                Ok(None) => false,
                Err(err) => {
                    tracing::error!(error = %err, resource_id = %resource_id, "resource lookup failed");
                    false
                }
            },
        }
    }
}

fn describe(requirement: &AccessRequirement) -> String {
    match requirement {
        AccessRequirement::Authenticated => "authentication required".to_string(),
        AccessRequirement::MinimumRole { role } => format!("requires {role} or above"),
        AccessRequirement::SystemAdmin => "requires system_admin".to_string(),
        AccessRequirement::Feature { feature } => format!("no access to {feature}"),
        AccessRequirement::Scoped { category, .. } | AccessRequirement::Resource { category, .. } => {
            format!("{} outside your jurisdiction", category.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::features;
    use uuid::Uuid;

    fn gate_with(lookup: StaticResourceLookup, mode: AuthzMode) -> AccessGate {
        AccessGate::new(
            Arc::new(RwLock::new(FeatureRegistry::seeded())),
            Arc::new(lookup),
            mode,
        )
    }

    fn district_engineer() -> Principal {
        Principal::new(Uuid::new_v4())
            .with_role(Role::DistrictEngineer)
            .with_jurisdiction(Jurisdiction::from_names(Some("ACCRA EAST REGION"), Some("MAKOLA")))
    }

    #[tokio::test]
    async fn anonymous_is_sent_to_login() {
        let gate = gate_with(StaticResourceLookup::new(), AuthzMode::Off);
        assert_eq!(
            gate.evaluate(None, &AccessRequirement::Authenticated).await,
            GateDecision::RedirectToLogin
        );
    }

    #[tokio::test]
    async fn feature_requirement_consults_registry() {
        let gate = gate_with(StaticResourceLookup::new(), AuthzMode::Strict);
        let subject = district_engineer();

        let allowed = gate
            .evaluate(Some(&subject), &AccessRequirement::feature(features::ASSET_MANAGEMENT))
            .await;
        assert_eq!(allowed, GateDecision::Allow);

        let denied = gate
            .evaluate(Some(&subject), &AccessRequirement::feature(features::USER_MANAGEMENT))
            .await;
        assert_eq!(denied, GateDecision::RedirectToUnauthorized);
        assert_eq!(denied.location(), Some("/unauthorized"));
    }

    #[tokio::test]
    async fn resource_requirement_resolves_location() {
        let lookup = StaticResourceLookup::new()
            .with(
                ResourceCategory::Asset,
                "vit-1",
                Jurisdiction::from_names(Some("ACCRA EAST REGION"), Some("MAKOLA")),
            )
            .with(
                ResourceCategory::Asset,
                "vit-2",
                Jurisdiction::from_names(Some("ACCRA EAST REGION"), Some("ADENTA")),
            );
        let gate = gate_with(lookup, AuthzMode::Strict);
        let subject = district_engineer();

        let own = AccessRequirement::Resource {
            category: ResourceCategory::Asset,
            resource_id: "vit-1".into(),
            action: Action::Edit,
        };
        let foreign = AccessRequirement::Resource {
            category: ResourceCategory::Asset,
            resource_id: "vit-2".into(),
            action: Action::View,
        };
        let missing = AccessRequirement::Resource {
            category: ResourceCategory::Asset,
            resource_id: "vit-404".into(),
            action: Action::View,
        };

        assert!(gate.evaluate(Some(&subject), &own).await.is_allowed());
        assert!(!gate.evaluate(Some(&subject), &foreign).await.is_allowed());
        assert!(!gate.evaluate(Some(&subject), &missing).await.is_allowed());
    }

    #[tokio::test]
    async fn advisory_mode_allows_but_strict_denies() {
        let subject = district_engineer();
        let requirement = AccessRequirement::SystemAdmin;

        let advisory = gate_with(StaticResourceLookup::new(), AuthzMode::Advisory);
        assert!(advisory.evaluate(Some(&subject), &requirement).await.is_allowed());

        let strict = gate_with(StaticResourceLookup::new(), AuthzMode::Strict);
        let err = strict.require(&subject, &requirement).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn minimum_role_uses_hierarchy() {
        let gate = gate_with(StaticResourceLookup::new(), AuthzMode::Strict);
        let subject = district_engineer();

        let lower = AccessRequirement::MinimumRole { role: Role::Technician };
        let higher = AccessRequirement::MinimumRole {
            role: Role::RegionalEngineer,
        };
        assert!(gate.evaluate(Some(&subject), &lower).await.is_allowed());
        assert!(!gate.evaluate(Some(&subject), &higher).await.is_allowed());
    }

    #[test]
    fn requirement_wire_format() {
        let parsed: AccessRequirement = serde_json::from_value(serde_json::json!({
            "kind": "scoped",
            "category": "load_monitoring",
            "action": "edit",
            "region": "tema region",
            "district": "ashaiman"
        }))
        .unwrap();

        assert_eq!(
            parsed,
            AccessRequirement::Scoped {
                category: ResourceCategory::LoadMonitoring,
                action: Action::Edit,
                region: ScopeName::parse("TEMA REGION"),
                district: ScopeName::parse("ASHAIMAN"),
            }
        );
    }
}
