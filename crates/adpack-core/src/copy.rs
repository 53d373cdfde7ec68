//! Copy pack and the claim-decision audit record.

use serde::{Deserialize, Serialize};

use crate::id::{ClaimDecisionId, JobId, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub duration_s: u32,
    pub text: String,
}

/// Marketing copy for one job, as produced by the copy stage (after guardrail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyPack {
    pub hooks: Vec<String>,
    pub scripts: Vec<Script>,
    pub ctas: Vec<String>,
    pub headlines: Vec<String>,
    pub primary_texts: Vec<String>,
}

impl CopyPack {
    /// Hook leading variant `index` (rotates through the list).
    pub fn hook_for(&self, index: usize) -> Option<&str> {
        rotate(&self.hooks, index)
    }

    pub fn cta_for(&self, index: usize) -> Option<&str> {
        rotate(&self.ctas, index)
    }

    pub fn headline_for(&self, index: usize) -> Option<&str> {
        rotate(&self.headlines, index)
    }
}

fn rotate(items: &[String], index: usize) -> Option<&str> {
    if items.is_empty() {
        None
    } else {
        Some(items[index % items.len()].as_str())
    }
}

/// Which part of the copy pack a decision concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyField {
    Hook,
    Headline,
    Cta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Rewritten,
    Flagged,
}

/// Append-only audit row written for every guardrail rewrite or flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDecision {
    pub id: ClaimDecisionId,
    pub job_id: JobId,
    pub workspace_id: WorkspaceId,
    pub field: CopyField,
    pub index: usize,
    pub term: String,
    pub original_text: String,
    pub decision: ClaimOutcome,
    pub rewritten_text: Option<String>,
    pub reason: String,
    pub created_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_wraps() {
        let pack = CopyPack {
            hooks: vec!["a".into(), "b".into(), "c".into()],
            scripts: vec![],
            ctas: vec!["x".into()],
            headlines: vec![],
            primary_texts: vec![],
        };
        assert_eq!(pack.hook_for(0), Some("a"));
        assert_eq!(pack.hook_for(4), Some("b"));
        assert_eq!(pack.cta_for(7), Some("x"));
        assert_eq!(pack.headline_for(0), None);
    }
}
