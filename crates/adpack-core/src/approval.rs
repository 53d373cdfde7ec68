//! Human-review gate for autonomous publication.

use serde::{Deserialize, Serialize};

use crate::format::AspectRatio;
use crate::id::{ApprovalId, JobId, UserId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

/// What the reviewer sees before deciding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub lead_hook: Option<String>,
    pub lead_cta: Option<String>,
    pub formats: Vec<AspectRatio>,
    pub compliance_approved: bool,
    pub compliance_issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalItem {
    pub id: ApprovalId,
    pub job_id: JobId,
    pub workspace_id: WorkspaceId,
    pub risk_level: RiskLevel,
    pub action_type: String,
    pub payload: ApprovalPayload,
    pub state: ApprovalState,
    pub reviewer: Option<UserId>,
    pub decided_ms: Option<u64>,
    pub rejection_reason: Option<String>,
    pub created_ms: u64,
}

pub const PUBLISH_CREATIVE: &str = "publish_creative";

/// A reviewer's call on a pending item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ApprovalItem {
    pub fn is_pending(&self) -> bool {
        self.state == ApprovalState::Pending
    }
}
