//! Assembly domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Assembly record
///
/// Shared with other services. The worker only owns `status`; every other
/// field is carried in `extra` so that a read-modify-write round trip leaves
/// it untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assembly {
    pub id: Uuid,
    pub status: AssemblyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Assembly lifecycle status as seen by a build job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssemblyStatus {
    Queued,
    UnitTesting,
    UnitTestingFailed,
    Building,
    Error,
    Complete,
}

impl AssemblyStatus {
    /// Whether no further transition is allowed within the same job
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssemblyStatus::UnitTestingFailed | AssemblyStatus::Error | AssemblyStatus::Complete
        )
    }

    /// Checks a transition against the job state graph
    ///
    /// ```text
    /// QUEUED -> UNIT_TESTING -> UNIT_TESTING_FAILED
    ///        \              \-> BUILDING -> COMPLETE
    ///         \---------------> BUILDING -> ERROR
    /// ```
    ///
    /// Any non-terminal status may fall to `ERROR`. Re-applying the current
    /// status is accepted so a retried write is harmless.
    pub fn can_transition_to(self, next: AssemblyStatus) -> bool {
        use AssemblyStatus::*;

        if self == next {
            return true;
        }

        match (self, next) {
            (Queued, UnitTesting) | (Queued, Building) => true,
            (UnitTesting, UnitTestingFailed) | (UnitTesting, Building) => true,
            (Building, Complete) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssemblyStatus::Queued => "QUEUED",
            AssemblyStatus::UnitTesting => "UNIT_TESTING",
            AssemblyStatus::UnitTestingFailed => "UNIT_TESTING_FAILED",
            AssemblyStatus::Building => "BUILDING",
            AssemblyStatus::Error => "ERROR",
            AssemblyStatus::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for AssemblyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
