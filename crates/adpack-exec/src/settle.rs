//! Settling guard for jobs left `running`.
//!
//! A job is written as `running` before the first external call. If the
//! future driving it is dropped (client disconnect, timeout) or unwinds, the
//! guard moves the stored row to its fallback status so the job never stays
//! `running`. Disarm it once the job has been settled normally.

use std::sync::Arc;

use adpack_core::now_millis;
use adpack_core::prelude::*;
use adpack_io::CreativeStore;

use crate::error::Result;

pub(crate) struct SettleGuard {
    store: Arc<dyn CreativeStore>,
    workspace: WorkspaceId,
    job_id: JobId,
    fallback: JobStatus,
    reason: &'static str,
    armed: bool,
}

impl SettleGuard {
    /// `fallback` must be reachable from `running`; `Failed` records `reason`.
    pub(crate) fn arm(
        store: Arc<dyn CreativeStore>,
        job: &Job,
        fallback: JobStatus,
        reason: &'static str,
    ) -> Self {
        Self {
            store,
            workspace: job.workspace_id,
            job_id: job.id,
            fallback,
            reason,
            armed: true,
        }
    }

    /// The job was settled by its owner; nothing left to do.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }

    fn settle(&self) -> Result<bool> {
        let mut job = self.store.get_job(self.workspace, self.job_id)?;
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        let now = now_millis();
        match self.fallback {
            JobStatus::Failed => job.fail(self.reason, now)?,
            other => job.transition(other, now)?,
        }
        self.store.update_job(&job)?;
        Ok(true)
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        match self.settle() {
            Ok(true) => tracing::warn!(
                job_id = %self.job_id,
                status = %self.fallback,
                reason = self.reason,
                "interrupted job settled"
            ),
            Ok(false) => {}
            Err(e) => tracing::error!(
                job_id = %self.job_id,
                error = %e,
                "could not settle interrupted job"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpack_io::MemoryStore;

    fn running_job(store: &Arc<dyn CreativeStore>) -> Job {
        let mut job = Job::new(
            WorkspaceId::new(),
            JobInput::new(Objective::Sale, "Summer Sale"),
            1,
        );
        store.insert_job(&job).unwrap();
        job.transition(JobStatus::Running, 2).unwrap();
        store.update_job(&job).unwrap();
        job
    }

    #[test]
    fn dropped_guard_fails_running_job() {
        let store: Arc<dyn CreativeStore> = Arc::new(MemoryStore::new());
        let job = running_job(&store);

        drop(SettleGuard::arm(store.clone(), &job, JobStatus::Failed, "init interrupted"));

        let stored = store.get_job(job.workspace_id, job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("init interrupted"));
    }

    #[test]
    fn dropped_guard_can_restore_done() {
        let store: Arc<dyn CreativeStore> = Arc::new(MemoryStore::new());
        let job = running_job(&store);

        drop(SettleGuard::arm(store.clone(), &job, JobStatus::Done, "render interrupted"));

        let stored = store.get_job(job.workspace_id, job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Done);
        assert!(stored.error.is_none());
    }

    #[test]
    fn disarmed_or_settled_jobs_are_left_alone() {
        let store: Arc<dyn CreativeStore> = Arc::new(MemoryStore::new());
        let job = running_job(&store);
        SettleGuard::arm(store.clone(), &job, JobStatus::Failed, "x").disarm();
        assert_eq!(
            store.get_job(job.workspace_id, job.id).unwrap().status,
            JobStatus::Running
        );

        let mut done = job.clone();
        done.transition(JobStatus::Done, 3).unwrap();
        store.update_job(&done).unwrap();
        drop(SettleGuard::arm(store.clone(), &job, JobStatus::Failed, "x"));
        assert_eq!(
            store.get_job(job.workspace_id, job.id).unwrap().status,
            JobStatus::Done
        );
    }
}
