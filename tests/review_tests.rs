//! Reviewer decisions on escalated jobs.

mod fakes;

use std::sync::Arc;

use adpack::core::prelude::*;
use adpack::exec::PipelineError;
use adpack::{Engine, InitRequest, RenderRequest};
use fakes::{engine, summer_sale, test_config, FakeGeneration, FakeRender, Reply};

fn manual_review_engine() -> Engine {
    engine(
        test_config(),
        &Arc::new(FakeGeneration::approving().with_compliance(Reply::Fail("offline".into()))),
        &Arc::new(FakeRender::all_succeed()),
    )
}

#[tokio::test]
async fn approving_manual_review_unblocks_render() {
    let engine = manual_review_engine();
    let ws = WorkspaceId::new();
    let summary = engine.init(ws, InitRequest::new(summer_sale())).await.unwrap();
    assert_eq!(summary.status, JobStatus::NeedsManualReview);
    let approval_id = summary.approval_id.unwrap();

    let reviewer = UserId::new();
    let item = engine
        .decide_approval(ws, approval_id, reviewer, ReviewDecision::Approve)
        .unwrap();
    assert_eq!(item.state, ApprovalState::Approved);
    assert_eq!(item.reviewer, Some(reviewer));
    assert!(item.decided_ms.is_some());

    let job = engine.job(ws, summary.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Done);
    // the verdict itself stays as the validator returned it
    assert!(!job.compliance.unwrap().approved);
    let blueprints = engine.store().list_blueprints(ws, summary.job_id).unwrap();
    assert!(blueprints.iter().all(|b| b.approved));

    let rendered = engine
        .render(ws, summary.job_id, RenderRequest::default())
        .await
        .unwrap();
    assert_eq!(rendered.status, JobStatus::Done);
    assert_eq!(rendered.renders.iter().filter(|r| r.succeeded()).count(), 3);
}

#[tokio::test]
async fn rejecting_manual_review_fails_the_job() {
    let engine = manual_review_engine();
    let ws = WorkspaceId::new();
    let summary = engine.init(ws, InitRequest::new(summer_sale())).await.unwrap();

    let item = engine
        .decide_approval(
            ws,
            summary.approval_id.unwrap(),
            UserId::new(),
            ReviewDecision::Reject {
                reason: Some("  off-brand tone ".into()),
            },
        )
        .unwrap();
    assert_eq!(item.state, ApprovalState::Rejected);
    assert_eq!(item.rejection_reason.as_deref(), Some("off-brand tone"));

    let job = engine.job(ws, summary.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("off-brand tone"));
    assert!(engine
        .store()
        .list_blueprints(ws, summary.job_id)
        .unwrap()
        .iter()
        .all(|b| !b.approved));
}

#[tokio::test]
async fn rejecting_a_done_job_withdraws_blueprint_approval() {
    let engine = engine(
        test_config(),
        &Arc::new(FakeGeneration::approving()),
        &Arc::new(FakeRender::all_succeed()),
    );
    let ws = WorkspaceId::new();
    let summary = engine.init(ws, InitRequest::new(summer_sale())).await.unwrap();
    assert_eq!(summary.status, JobStatus::Done);

    engine
        .decide_approval(
            ws,
            summary.approval_id.unwrap(),
            UserId::new(),
            ReviewDecision::Reject { reason: None },
        )
        .unwrap();
    assert_eq!(engine.job(ws, summary.job_id).unwrap().status, JobStatus::Done);

    let rendered = engine
        .render(ws, summary.job_id, RenderRequest::default())
        .await
        .unwrap();
    assert_eq!(rendered.status, JobStatus::Failed);
    assert!(rendered.renders.iter().all(|r| !r.succeeded()));
}

#[tokio::test]
async fn decisions_are_final() {
    let engine = manual_review_engine();
    let ws = WorkspaceId::new();
    let summary = engine.init(ws, InitRequest::new(summer_sale())).await.unwrap();
    let approval_id = summary.approval_id.unwrap();

    engine
        .decide_approval(ws, approval_id, UserId::new(), ReviewDecision::Approve)
        .unwrap();
    let err = engine
        .decide_approval(
            ws,
            approval_id,
            UserId::new(),
            ReviewDecision::Reject { reason: None },
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::Conflict(_)));

    let item = engine.store().get_approval(ws, approval_id).unwrap();
    assert_eq!(item.state, ApprovalState::Approved);

    // another workspace cannot see the item
    let err = engine
        .decide_approval(
            WorkspaceId::new(),
            approval_id,
            UserId::new(),
            ReviewDecision::Approve,
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::Forbidden(_)));
}
