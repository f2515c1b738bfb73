//! Authorization module - role hierarchy, feature registry, scoped checks and the gate
//!
//! This module implements the permission engine with support for:
//! - Ranked roles with a system_admin superuser
//! - A runtime-mutable feature -> roles registry
//! - Region/district scoped resource checks driven by one rule table
//! - Configurable enforcement modes (off/advisory/strict)

mod gate;
mod principal;
mod registry;
mod role;
pub mod scope;

pub use gate::{AccessGate, AccessRequirement, GateDecision, ResourceLookup, StaticResourceLookup};
pub use principal::Principal;
pub use registry::{FeatureKey, FeaturePermissions, FeatureRegistry};
pub use role::{meets_minimum, Role, ScopeRequirement, UnknownRole};
pub use scope::{Action, Jurisdiction, ResourceCategory, ScopeName};

/// Authorization enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzMode {
    /// No permission checks, authentication still required (development mode)
    Off,
    /// Log denials but allow requests (testing mode)
    Advisory,
    /// Deny with 403 / redirect to /unauthorized (production mode)
    Strict,
}

impl AuthzMode {
    pub fn from_env() -> Self {
        match std::env::var("AUTHZ_MODE").unwrap_or_default().to_lowercase().as_str() {
            "advisory" => AuthzMode::Advisory,
            "off" => AuthzMode::Off,
            _ => AuthzMode::Strict,
        }
    }
}

/// Well-known feature keys seeded into every registry
pub mod features {
    pub const ASSET_MANAGEMENT: &str = "asset_management";
    pub const INSPECTION_MANAGEMENT: &str = "inspection_management";
    pub const LOAD_MONITORING: &str = "load_monitoring";
    pub const FAULT_MANAGEMENT: &str = "fault_management";
    pub const ANALYTICS_DASHBOARD: &str = "analytics_dashboard";
    pub const USER_MANAGEMENT: &str = "user_management";
    pub const SYSTEM_CONFIGURATION: &str = "system_configuration";
}
