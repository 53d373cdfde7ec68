//! Approval escalation and reviewer decisions.
//!
//! Publishing is high-risk, so under `PublishPolicy::AlwaysEscalate` every
//! job that reaches the end of the init phase gets a pending Approval Item,
//! approved or not. The QCO verdict itself is never changed by a reviewer.

use adpack_core::prelude::*;

use crate::traits::StageError;

#[derive(Debug, Clone, Copy)]
pub struct ApprovalEscalator {
    policy: PublishPolicy,
}

impl ApprovalEscalator {
    pub fn new(policy: PublishPolicy) -> Self {
        Self { policy }
    }

    /// Status the job settles in once compliance has spoken.
    pub fn settled_status(verdict: &ComplianceVerdict) -> JobStatus {
        if verdict.approved {
            JobStatus::Done
        } else {
            JobStatus::NeedsManualReview
        }
    }

    /// Build the Approval Item for `job`, or `None` when policy lets it publish alone.
    pub fn escalate(
        &self,
        job: &Job,
        verdict: &ComplianceVerdict,
        formats: &[AspectRatio],
        now_ms: u64,
    ) -> Option<ApprovalItem> {
        if verdict.approved && self.policy == PublishPolicy::AutoPublishWhenApproved {
            return None;
        }

        let copy = job.copy.as_ref();
        Some(ApprovalItem {
            id: ApprovalId::new(),
            job_id: job.id,
            workspace_id: job.workspace_id,
            risk_level: RiskLevel::High,
            action_type: PUBLISH_CREATIVE.to_string(),
            payload: ApprovalPayload {
                lead_hook: copy.and_then(|c| c.hook_for(0)).map(str::to_string),
                lead_cta: copy.and_then(|c| c.cta_for(0)).map(str::to_string),
                formats: formats.to_vec(),
                compliance_approved: verdict.approved,
                compliance_issues: verdict.issues.clone(),
            },
            state: ApprovalState::Pending,
            reviewer: None,
            decided_ms: None,
            rejection_reason: None,
            created_ms: now_ms,
        })
    }
}

/// What a decision did, for the caller to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionEffect {
    pub job_status: JobStatus,
    /// New approval flag for every blueprint of the job, if it changes.
    pub blueprints_approved: Option<bool>,
}

/// Applies reviewer decisions to an item and its job.
pub struct ApprovalDesk;

impl ApprovalDesk {
    /// Decide a pending item. Both rows are only modified when the call succeeds.
    pub fn decide(
        item: &mut ApprovalItem,
        job: &mut Job,
        decision: ReviewDecision,
        reviewer: UserId,
        now_ms: u64,
    ) -> Result<DecisionEffect, StageError> {
        if item.job_id != job.id {
            return Err(StageError::Conflict(format!(
                "approval {} does not gate job {}",
                item.id, job.id
            )));
        }
        if !item.is_pending() {
            return Err(StageError::Conflict(format!(
                "approval {} was already decided",
                item.id
            )));
        }

        let mut next = job.clone();
        let (state, reason, blueprints_approved) = match decision {
            ReviewDecision::Approve => {
                let flag = if next.status == JobStatus::NeedsManualReview {
                    next.transition(JobStatus::Done, now_ms)?;
                    Some(true)
                } else {
                    None
                };
                (ApprovalState::Approved, None, flag)
            }
            ReviewDecision::Reject { reason } => {
                let reason = reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty());
                let flag = match next.status {
                    JobStatus::NeedsManualReview => {
                        let msg = reason
                            .clone()
                            .unwrap_or_else(|| "rejected by reviewer".to_string());
                        next.fail(msg, now_ms)?;
                        Some(false)
                    }
                    JobStatus::Done | JobStatus::Running => Some(false),
                    _ => None,
                };
                (ApprovalState::Rejected, reason, flag)
            }
        };

        item.state = state;
        item.reviewer = Some(reviewer);
        item.decided_ms = Some(now_ms);
        item.rejection_reason = reason;
        *job = next;

        tracing::info!(
            approval_id = %item.id,
            job_id = %job.id,
            state = ?item.state,
            job_status = %job.status,
            "approval decided"
        );
        Ok(DecisionEffect {
            job_status: job.status,
            blueprints_approved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> Job {
        let mut j = Job::new(
            WorkspaceId::new(),
            JobInput::new(Objective::Sale, "Summer Sale"),
            1,
        );
        j.status = status;
        j.copy = Some(CopyPack {
            hooks: vec!["Hook A".into(), "Hook B".into()],
            scripts: vec![],
            ctas: vec!["Shop".into()],
            headlines: vec![],
            primary_texts: vec![],
        });
        j
    }

    fn approved() -> ComplianceVerdict {
        ComplianceVerdict {
            approved: true,
            issues: vec![],
        }
    }

    #[test]
    fn always_escalates_by_default() {
        let j = job(JobStatus::Running);
        let item = ApprovalEscalator::new(PublishPolicy::AlwaysEscalate)
            .escalate(&j, &approved(), &AspectRatio::ALL, 5)
            .expect("item");
        assert_eq!(item.risk_level, RiskLevel::High);
        assert_eq!(item.action_type, PUBLISH_CREATIVE);
        assert_eq!(item.payload.lead_hook.as_deref(), Some("Hook A"));
        assert_eq!(item.payload.formats.len(), 3);
        assert!(item.is_pending());
    }

    #[test]
    fn auto_publish_skips_only_approved_jobs() {
        let esc = ApprovalEscalator::new(PublishPolicy::AutoPublishWhenApproved);
        let j = job(JobStatus::Running);
        assert!(esc.escalate(&j, &approved(), &AspectRatio::ALL, 5).is_none());
        let rejected = ComplianceVerdict::rejected("manual review required");
        assert!(esc.escalate(&j, &rejected, &AspectRatio::ALL, 5).is_some());
        assert_eq!(
            ApprovalEscalator::settled_status(&rejected),
            JobStatus::NeedsManualReview
        );
    }

    fn pending_for(j: &Job) -> ApprovalItem {
        ApprovalEscalator::new(PublishPolicy::AlwaysEscalate)
            .escalate(j, &ComplianceVerdict::rejected("x"), &AspectRatio::ALL, 2)
            .expect("item")
    }

    #[test]
    fn approving_manual_review_completes_job() {
        let mut j = job(JobStatus::NeedsManualReview);
        let mut item = pending_for(&j);
        let reviewer = UserId::new();
        let effect =
            ApprovalDesk::decide(&mut item, &mut j, ReviewDecision::Approve, reviewer, 9).unwrap();
        assert_eq!(effect.job_status, JobStatus::Done);
        assert_eq!(effect.blueprints_approved, Some(true));
        assert_eq!(item.state, ApprovalState::Approved);
        assert_eq!(item.reviewer, Some(reviewer));
        // verdict untouched
        assert!(item.payload.compliance_issues.contains(&"x".to_string()));
    }

    #[test]
    fn rejecting_manual_review_fails_job() {
        let mut j = job(JobStatus::NeedsManualReview);
        let mut item = pending_for(&j);
        let effect = ApprovalDesk::decide(
            &mut item,
            &mut j,
            ReviewDecision::Reject {
                reason: Some("off brand".into()),
            },
            UserId::new(),
            9,
        )
        .unwrap();
        assert_eq!(effect.job_status, JobStatus::Failed);
        assert_eq!(j.error.as_deref(), Some("off brand"));
        assert_eq!(item.rejection_reason.as_deref(), Some("off brand"));
    }

    #[test]
    fn rejecting_done_job_withdraws_blueprints() {
        let mut j = job(JobStatus::Done);
        let mut item = pending_for(&j);
        let effect = ApprovalDesk::decide(
            &mut item,
            &mut j,
            ReviewDecision::Reject { reason: None },
            UserId::new(),
            9,
        )
        .unwrap();
        assert_eq!(effect.job_status, JobStatus::Done);
        assert_eq!(effect.blueprints_approved, Some(false));
    }

    #[test]
    fn second_decision_conflicts() {
        let mut j = job(JobStatus::NeedsManualReview);
        let mut item = pending_for(&j);
        ApprovalDesk::decide(&mut item, &mut j, ReviewDecision::Approve, UserId::new(), 9)
            .unwrap();
        let before = j.clone();
        let err = ApprovalDesk::decide(&mut item, &mut j, ReviewDecision::Approve, UserId::new(), 10)
            .unwrap_err();
        assert!(matches!(err, StageError::Conflict(_)));
        assert_eq!(j, before);
    }
}
