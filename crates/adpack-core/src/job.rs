//! Job model and its state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::copy::CopyPack;
use crate::error::{Error, Result};
use crate::format::AspectRatio;
use crate::id::{ApprovalId, ExperimentId, JobId, SiteId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Lead,
    Sale,
    Booking,
    Awareness,
}

impl Objective {
    pub fn as_str(self) -> &'static str {
        match self {
            Objective::Lead => "lead",
            Objective::Sale => "sale",
            Objective::Booking => "booking",
            Objective::Awareness => "awareness",
        }
    }
}

impl FromStr for Objective {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lead" => Ok(Objective::Lead),
            "sale" => Ok(Objective::Sale),
            "booking" => Ok(Objective::Booking),
            "awareness" => Ok(Objective::Awareness),
            other => Err(Error::Parse(format!("unknown objective '{other}'"))),
        }
    }
}

fn default_language() -> String {
    "fr".to_string()
}

fn default_duration() -> u32 {
    15
}

/// What the caller asked for. Immutable once the job exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    pub objective: Objective,
    pub offer: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub geo: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default = "default_duration")]
    pub duration_s: u32,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub product_images: Vec<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    /// Free-form tone guidance handed to the copy stage.
    #[serde(default)]
    pub brand_voice: Option<String>,
}

impl JobInput {
    pub fn new(objective: Objective, offer: impl Into<String>) -> Self {
        Self {
            objective,
            offer: offer.into(),
            language: default_language(),
            geo: None,
            style: None,
            duration_s: default_duration(),
            site_url: None,
            logo_url: None,
            product_images: Vec::new(),
            brand_name: None,
            brand_voice: None,
        }
    }

    /// Reject inputs no stage could work with.
    pub fn validate(&self) -> Result<()> {
        if self.offer.trim().is_empty() {
            return Err(Error::Parse("offer must not be empty".into()));
        }
        if !(5..=120).contains(&self.duration_s) {
            return Err(Error::Parse(format!(
                "duration_s must be within 5..=120, got {}",
                self.duration_s
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
    NeedsManualReview,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::NeedsManualReview => "needs_manual_review",
        }
    }

    /// Legal edges of the job state machine.
    ///
    /// `Done -> Running` is the render phase and `Failed -> Running` a render
    /// retry (the engine only allows it when approved blueprints exist);
    /// `NeedsManualReview` only moves on a reviewer decision.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Running, Done)
                | (Running, Failed)
                | (Running, NeedsManualReview)
                | (NeedsManualReview, Done)
                | (NeedsManualReview, Failed)
                | (Done, Running)
                | (Failed, Running)
        )
    }

    /// Terminal for the generation pipeline (no automatic stage runs next).
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Failed | JobStatus::NeedsManualReview
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the compliance gate. Kept on the job as part of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub approved: bool,
    pub issues: Vec<String>,
}

impl ComplianceVerdict {
    pub fn rejected(issue: impl Into<String>) -> Self {
        Self {
            approved: false,
            issues: vec![issue.into()],
        }
    }
}

/// Per-format render outcome recorded on the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub aspect_ratio: AspectRatio,
    pub variant: crate::blueprint::VariantTag,
    pub render_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl RenderResult {
    pub fn succeeded(&self) -> bool {
        self.url.is_some() && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub workspace_id: WorkspaceId,
    pub site_id: Option<SiteId>,
    pub experiment_id: Option<ExperimentId>,
    pub input: JobInput,
    pub status: JobStatus,
    pub idempotency_key: Option<String>,
    pub copy: Option<CopyPack>,
    pub blueprint_count: usize,
    pub compliance: Option<ComplianceVerdict>,
    pub renders: Vec<RenderResult>,
    pub cost_estimate_cents: u64,
    pub duration_ms: u64,
    pub approval_id: Option<ApprovalId>,
    pub error: Option<String>,
    pub created_ms: u64,
    pub updated_ms: u64,
}

impl Job {
    pub fn new(workspace_id: WorkspaceId, input: JobInput, now_ms: u64) -> Self {
        Self {
            id: JobId::new(),
            workspace_id,
            site_id: None,
            experiment_id: None,
            input,
            status: JobStatus::Queued,
            idempotency_key: None,
            copy: None,
            blueprint_count: 0,
            compliance: None,
            renders: Vec::new(),
            cost_estimate_cents: 0,
            duration_ms: 0,
            approval_id: None,
            error: None,
            created_ms: now_ms,
            updated_ms: now_ms,
        }
    }

    /// Move to `next`, refusing edges the state machine does not allow.
    pub fn transition(&mut self, next: JobStatus, now_ms: u64) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Transition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_ms = now_ms;
        Ok(())
    }

    /// Convenience for the failure edge: transition and record the reason.
    pub fn fail(&mut self, reason: impl Into<String>, now_ms: u64) -> Result<()> {
        self.transition(JobStatus::Failed, now_ms)?;
        self.error = Some(reason.into());
        Ok(())
    }

    pub fn brand(&self) -> &str {
        self.input
            .brand_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("brand")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(WorkspaceId::new(), JobInput::new(Objective::Sale, "Summer Sale"), 1)
    }

    #[test]
    fn happy_path_transitions() {
        let mut j = job();
        j.transition(JobStatus::Running, 2).unwrap();
        j.transition(JobStatus::NeedsManualReview, 3).unwrap();
        j.transition(JobStatus::Done, 4).unwrap();
        // render phase
        j.transition(JobStatus::Running, 5).unwrap();
        j.transition(JobStatus::Done, 6).unwrap();
        assert_eq!(j.updated_ms, 6);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut j = job();
        assert!(j.transition(JobStatus::Done, 2).is_err());
        j.transition(JobStatus::Running, 2).unwrap();
        j.fail("boom", 3).unwrap();
        assert_eq!(j.error.as_deref(), Some("boom"));
        assert!(j.transition(JobStatus::Done, 4).is_err());
        assert!(j.transition(JobStatus::NeedsManualReview, 4).is_err());
        assert_eq!(j.status, JobStatus::Failed);
        // render retry
        j.transition(JobStatus::Running, 5).unwrap();
        assert!(j.transition(JobStatus::Queued, 6).is_err());
    }

    #[test]
    fn input_validation() {
        let mut input = JobInput::new(Objective::Lead, "  ");
        assert!(input.validate().is_err());
        input.offer = "Free audit".into();
        input.duration_s = 2;
        assert!(input.validate().is_err());
        input.duration_s = 30;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn input_defaults_from_json() {
        let input: JobInput =
            serde_json::from_str(r#"{"objective":"sale","offer":"Summer Sale"}"#).unwrap();
        assert_eq!(input.duration_s, 15);
        assert_eq!(input.language, "fr");
        assert!(input.product_images.is_empty());
    }

    #[test]
    fn brand_falls_back() {
        let mut j = job();
        assert_eq!(j.brand(), "brand");
        j.input.brand_name = Some("Acme".into());
        assert_eq!(j.brand(), "Acme");
    }
}
