use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authz::{FeatureKey, Role};
use crate::events::{Loggable, Severity};

/// A feature and the roles allowed to use it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Feature {
    #[schema(example = "analytics_dashboard")]
    pub key: String,
    pub roles: Vec<Role>,
}

impl Feature {
    pub fn new(key: &FeatureKey, roles: &BTreeSet<Role>) -> Self {
        Self {
            key: key.to_string(),
            roles: roles.iter().copied().collect(),
        }
    }
}

impl Loggable for Feature {
    fn entity_type() -> &'static str {
        "feature"
    }

    fn subject_id(&self) -> String {
        self.key.clone()
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeatureCreateRequest {
    #[schema(example = "outage_reports")]
    pub key: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeatureUpdateRequest {
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeatureAccessResponse {
    pub feature: String,
    pub role: Option<Role>,
    pub allowed: bool,
}
