//! Approval workflow for tool calls that require user consent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ApprovalError;

/// Where a tool call stands in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// No decision yet.
    Idle,
    /// A decision was made and is on its way to the backend.
    Submitting,
    /// The call was approved.
    Approved,
    /// The call was denied.
    Denied,
}

/// Submits approve/deny decisions and reports their progress.
pub trait ApprovalHandler {
    /// Submits a decision for a tool call.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be accepted.
    fn submit(&mut self, tool_call_id: &str, approve: bool) -> Result<(), ApprovalError>;

    /// Current status for a tool call.
    fn status(&self, tool_call_id: &str) -> ApprovalStatus;
}

/// A decision waiting to be shipped to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// The tool call decided on.
    pub tool_call_id: String,
    /// `true` to approve, `false` to deny.
    pub approve: bool,
}

/// In-memory approval handler.
///
/// Decisions stay `Submitting` until the host takes them with
/// [`drain`](Self::drain), after which they report their outcome.
#[derive(Debug, Default)]
pub struct ApprovalQueue {
    outbox: Vec<Decision>,
    decided: HashMap<String, bool>,
}

impl ApprovalQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the decisions not yet shipped, in submission order.
    pub fn drain(&mut self) -> Vec<Decision> {
        std::mem::take(&mut self.outbox)
    }
}

impl ApprovalHandler for ApprovalQueue {
    fn submit(&mut self, tool_call_id: &str, approve: bool) -> Result<(), ApprovalError> {
        if tool_call_id.trim().is_empty() {
            return Err(ApprovalError::EmptyId);
        }
        if self.decided.contains_key(tool_call_id) {
            return Err(ApprovalError::AlreadyDecided(tool_call_id.to_string()));
        }

        log::debug!(
            "approval: {} tool call {tool_call_id}",
            if approve { "approving" } else { "denying" }
        );
        self.decided.insert(tool_call_id.to_string(), approve);
        self.outbox.push(Decision {
            tool_call_id: tool_call_id.to_string(),
            approve,
        });
        Ok(())
    }

    fn status(&self, tool_call_id: &str) -> ApprovalStatus {
        match self.decided.get(tool_call_id) {
            None => ApprovalStatus::Idle,
            Some(_) if self.outbox.iter().any(|d| d.tool_call_id == tool_call_id) => {
                ApprovalStatus::Submitting
            }
            Some(true) => ApprovalStatus::Approved,
            Some(false) => ApprovalStatus::Denied,
        }
    }
}
