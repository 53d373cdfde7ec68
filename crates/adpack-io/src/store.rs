//! Workspace-scoped row store.
//!
//! Every read takes the caller's workspace and every write carries it on the
//! row; an implementation must refuse rows owned by another workspace
//! (`StoreError::AccessDenied`) rather than rely on callers to filter.

use adpack_core::prelude::*;

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait CreativeStore: Send + Sync {
    // --- jobs ---

    /// Insert a new job. When the job carries an idempotency key already used
    /// in the same workspace, nothing is written and
    /// `StoreError::DuplicateIdempotencyKey` names the existing job. The check
    /// and the insert are one atomic step.
    fn insert_job(&self, job: &Job) -> StoreResult<()>;

    fn get_job(&self, workspace: WorkspaceId, id: JobId) -> StoreResult<Job>;

    /// Replace a job row; the stored and the new row must share a workspace.
    fn update_job(&self, job: &Job) -> StoreResult<()>;

    fn find_job_by_idempotency_key(
        &self,
        workspace: WorkspaceId,
        key: &str,
    ) -> StoreResult<Option<Job>>;

    fn count_jobs(&self, workspace: WorkspaceId) -> StoreResult<usize>;

    // --- blueprints ---

    /// Insert a job's full blueprint set together with the Approval Item that
    /// gates it, in one step. Either every row is written or none is.
    fn insert_reviewed_blueprints(
        &self,
        workspace: WorkspaceId,
        blueprints: &[Blueprint],
        approval: Option<&ApprovalItem>,
    ) -> StoreResult<()>;

    /// Blueprints of a job, in insertion order.
    fn list_blueprints(&self, workspace: WorkspaceId, job: JobId) -> StoreResult<Vec<Blueprint>>;

    fn set_blueprints_approved(
        &self,
        workspace: WorkspaceId,
        job: JobId,
        approved: bool,
    ) -> StoreResult<usize>;

    // --- assets ---

    fn insert_asset(&self, asset: &Asset) -> StoreResult<()>;

    fn list_assets(&self, workspace: WorkspaceId, job: JobId) -> StoreResult<Vec<Asset>>;

    // --- claim decisions (append-only) ---

    fn append_claim_decisions(
        &self,
        workspace: WorkspaceId,
        decisions: &[ClaimDecision],
    ) -> StoreResult<()>;

    fn list_claim_decisions(
        &self,
        workspace: WorkspaceId,
        job: JobId,
    ) -> StoreResult<Vec<ClaimDecision>>;

    // --- approvals ---

    fn get_approval(&self, workspace: WorkspaceId, id: ApprovalId) -> StoreResult<ApprovalItem>;

    fn update_approval(&self, item: &ApprovalItem) -> StoreResult<()>;

    // --- experiments (read-mostly) ---

    fn get_experiment(
        &self,
        workspace: WorkspaceId,
        id: ExperimentId,
    ) -> StoreResult<Option<Experiment>>;

    fn upsert_experiment(&self, experiment: &Experiment) -> StoreResult<()>;
}
