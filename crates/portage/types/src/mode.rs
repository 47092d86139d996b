//! Migration modes

use serde::{Deserialize, Serialize};

/// How pending changes are grouped and replayed into the destination
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowMode {
    /// One destination change per origin change, in order
    Iterative,
    /// All pending changes collapsed into one destination change
    Squash,
    /// One review-style change for a single requested reference
    ChangeRequest,
    /// Squash, after verifying the destination still matches the last
    /// migrated revision
    CheckLastRevState,
}

impl WorkflowMode {
    pub const ALL: [WorkflowMode; 4] = [
        WorkflowMode::Iterative,
        WorkflowMode::Squash,
        WorkflowMode::ChangeRequest,
        WorkflowMode::CheckLastRevState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowMode::Iterative => "ITERATIVE",
            WorkflowMode::Squash => "SQUASH",
            WorkflowMode::ChangeRequest => "CHANGE_REQUEST",
            WorkflowMode::CheckLastRevState => "CHECK_LAST_REV_STATE",
        }
    }

    /// Lower-case name used for profiler scopes
    pub fn task_name(&self) -> String {
        self.as_str().to_lowercase()
    }

    /// Iterative migrations identify each change by its canonical revision,
    /// so commits sharing a context reference stay separate.
    pub fn uses_canonical_identity(&self) -> bool {
        matches!(self, WorkflowMode::Iterative)
    }
}

impl std::fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowMode {
    type Err = crate::PortageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::PortageError::Validation(format!("Unknown workflow mode: {}", s)))
    }
}
