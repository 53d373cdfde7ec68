//! Compliance gate (QCO). Fail-closed.
//!
//! The verdict is `approved` only when the compliance service answered in
//! time, its answer parsed as `{"approved": true, ...}`, and the local
//! structural checks found nothing. Every other outcome is a rejection that
//! carries an explicit "manual review required" issue.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use adpack_core::prelude::*;
use adpack_io::{GenerationPurpose, GenerationRequest, GenerationService};

use crate::traits::{extract_json, with_deadline, StageError};

const STAGE: &str = "compliance";

/// Overlays with more lines than this fail the readability rule.
pub const MAX_OVERLAY_LINES: usize = 2;

const SYSTEM: &str = "You are an advertising compliance officer. Review the copy and storyboards \
against these rules: (1) no unverifiable claims; (2) no health or financial claims without a \
source; (3) no excessive emotional manipulation; (4) all text inside the platform safe zones; \
(5) sufficient text/background contrast; (6) at most 2 lines of text per screen. Answer with a \
single JSON object {\"approved\": bool, \"issues\": [string]}. When unsure, do not approve.";

#[derive(Debug, Deserialize)]
struct WireVerdict {
    approved: bool,
    #[serde(default)]
    issues: Vec<String>,
}

#[derive(Serialize)]
struct ReviewPayload<'a> {
    copy: &'a CopyPack,
    blueprints: &'a [Blueprint],
}

pub struct ComplianceValidator {
    service: Arc<dyn GenerationService>,
    deadline: Duration,
}

impl ComplianceValidator {
    pub fn new(service: Arc<dyn GenerationService>, deadline: Duration) -> Self {
        Self { service, deadline }
    }

    /// Never errors: anything short of a clean approval is a rejection.
    pub async fn validate(&self, copy: &CopyPack, blueprints: &[Blueprint]) -> ComplianceVerdict {
        let local = structural_issues(blueprints);

        let remote = match serde_json::to_string(&ReviewPayload { copy, blueprints }) {
            Ok(prompt) => {
                let request = GenerationRequest::json(GenerationPurpose::Compliance, SYSTEM, prompt);
                with_deadline(STAGE, self.deadline, self.service.generate(request))
                    .await
                    .and_then(|raw| parse_verdict(&raw))
            }
            Err(e) => Err(StageError::malformed(STAGE, format!("review payload: {e}"))),
        };

        let verdict = combine(remote, local);
        if verdict.approved {
            tracing::info!(blueprints = blueprints.len(), "compliance approved");
        } else {
            tracing::warn!(issues = ?verdict.issues, "compliance not approved");
        }
        verdict
    }
}

fn parse_verdict(raw: &str) -> Result<ComplianceVerdict, StageError> {
    let value: serde_json::Value = serde_json::from_str(extract_json(raw))
        .map_err(|e| StageError::malformed(STAGE, e.to_string()))?;
    if !value.is_object() {
        return Err(StageError::malformed(STAGE, "verdict is not a JSON object"));
    }
    let wire: WireVerdict =
        serde_json::from_value(value).map_err(|e| StageError::malformed(STAGE, e.to_string()))?;
    Ok(ComplianceVerdict {
        approved: wire.approved,
        issues: wire.issues,
    })
}

fn combine(remote: Result<ComplianceVerdict, StageError>, local: Vec<String>) -> ComplianceVerdict {
    let mut verdict = match remote {
        Ok(v) => v,
        Err(StageError::Timeout { ms, .. }) => ComplianceVerdict::rejected(format!(
            "compliance review timed out after {ms} ms; manual review required"
        )),
        Err(StageError::Generation { source, .. }) => ComplianceVerdict::rejected(format!(
            "compliance service unavailable ({source}); manual review required"
        )),
        Err(e) => ComplianceVerdict::rejected(format!(
            "compliance verdict unreadable ({e}); manual review required"
        )),
    };

    if !verdict.approved && verdict.issues.is_empty() {
        verdict
            .issues
            .push("rejected without details; manual review required".to_string());
    }
    if !local.is_empty() {
        verdict.approved = false;
        verdict.issues.extend(local);
    }
    verdict
}

/// Checks that need no service: safe-zone declarations and line counts.
pub fn structural_issues(blueprints: &[Blueprint]) -> Vec<String> {
    let mut issues = Vec::new();
    for bp in blueprints {
        for (scene, overlay) in bp.overlays() {
            match overlay.inside_safe_zone {
                None => issues.push(format!(
                    "{} scene {scene}: text overlay does not declare safe-zone placement",
                    bp.label()
                )),
                Some(false) => issues.push(format!(
                    "{} scene {scene}: text overlay outside the safe zone",
                    bp.label()
                )),
                Some(true) => {}
            }
            let lines = overlay.line_count();
            if lines > MAX_OVERLAY_LINES {
                issues.push(format!(
                    "{} scene {scene}: {lines} text lines on screen (max {MAX_OVERLAY_LINES})",
                    bp.label()
                ));
            }
        }
    }
    issues
}
