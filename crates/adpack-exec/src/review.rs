//! Reviewer decisions on Approval Items.

use adpack_core::now_millis;
use adpack_core::prelude::*;
use adpack_stages::ApprovalDesk;

use crate::error::Result;
use crate::runtime::Engine;

impl Engine {
    /// Approve or reject a pending item, then persist the item, its job and,
    /// when the decision changes it, the blueprints' approval flag.
    pub fn decide_approval(
        &self,
        workspace: WorkspaceId,
        approval_id: ApprovalId,
        reviewer: UserId,
        decision: ReviewDecision,
    ) -> Result<ApprovalItem> {
        let mut item = self.store.get_approval(workspace, approval_id)?;
        let mut job = self.store.get_job(workspace, item.job_id)?;

        let effect = ApprovalDesk::decide(&mut item, &mut job, decision, reviewer, now_millis())?;

        if let Some(flag) = effect.blueprints_approved {
            let n = self.store.set_blueprints_approved(workspace, job.id, flag)?;
            tracing::debug!(job_id = %job.id, blueprints = n, approved = flag, "blueprint approval updated");
        }
        self.store.update_job(&job)?;
        self.store.update_approval(&item)?;
        Ok(item)
    }
}
