use serde::Serialize;
use utoipa::ToSchema;

use crate::authz::GateDecision;

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessCheckResponse {
    pub decision: GateDecision,
    pub allowed: bool,
    /// Where a client should navigate instead, when not allowed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl From<GateDecision> for AccessCheckResponse {
    fn from(decision: GateDecision) -> Self {
        Self {
            decision,
            allowed: decision.is_allowed(),
            redirect_to: decision.location().map(String::from),
        }
    }
}
