use serde::{Deserialize, Serialize};

/// Severity levels for audit entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Credential and permission changes, deletions
    Critical,
    #[default]
    Important,
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities whose changes are written to the audit trail.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. "staff_id" in "staff_id.created"
    fn entity_type() -> &'static str;

    /// Key of the changed entity (staff id, user uuid, feature key)
    fn subject_id(&self) -> String;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "disabled" | "password_reset" => Severity::Critical,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
