//! Commit-status payload posted to the external review system

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: CommitState,
    pub description: String,
    pub target_url: String,
}

impl CommitStatus {
    pub fn pending(target_url: impl Into<String>) -> Self {
        Self {
            state: CommitState::Pending,
            description: "Kiln says: Testing in progress".to_string(),
            target_url: target_url.into(),
        }
    }

    /// Status reported once the test command has finished
    pub fn finished(passed: bool, target_url: impl Into<String>) -> Self {
        let (state, description) = if passed {
            (CommitState::Success, "Kiln says: Tests passed")
        } else {
            (CommitState::Failure, "Kiln says: Tests failed")
        };

        Self {
            state,
            description: description.to_string(),
            target_url: target_url.into(),
        }
    }
}
