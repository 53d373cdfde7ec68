//! In-memory store backend.
//!
//! Implements both `CreativeStore` and `adpack_quota::CounterStore`. Used by
//! the server for single-node deployments and by every test. Workspace
//! isolation is enforced here exactly as a row-level policy would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use adpack_core::prelude::*;
use adpack_quota::{cas_decrement, cas_increment, CounterStore, Error as QuotaError};

use crate::error::StoreError;
use crate::store::{CreativeStore, StoreResult};

#[derive(Default)]
struct Tables {
    jobs: HashMap<JobId, Job>,
    idempotency: HashMap<(WorkspaceId, String), JobId>,
    blueprints: HashMap<JobId, Vec<Blueprint>>,
    assets: HashMap<JobId, Vec<Asset>>,
    claim_decisions: HashMap<JobId, Vec<ClaimDecision>>,
    approvals: HashMap<ApprovalId, ApprovalItem>,
    experiments: HashMap<ExperimentId, Experiment>,
}

/// Thread-safe in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    counters: Arc<Mutex<HashMap<WorkspaceId, Arc<AtomicUsize>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn counter(&self, workspace: WorkspaceId) -> Result<Arc<AtomicUsize>, QuotaError> {
        let mut map = self
            .counters
            .lock()
            .map_err(|_| QuotaError::Backend("quota counter map poisoned".into()))?;
        Ok(Arc::clone(map.entry(workspace).or_default()))
    }

    /// Jobs across all workspaces (test/diagnostic helper).
    pub fn total_jobs(&self) -> usize {
        self.tables().map(|t| t.jobs.len()).unwrap_or(0)
    }
}

fn ensure_owner(
    entity: &'static str,
    id: impl ToString,
    owner: WorkspaceId,
    caller: WorkspaceId,
) -> StoreResult<()> {
    if owner == caller {
        Ok(())
    } else {
        Err(StoreError::AccessDenied {
            entity,
            id: id.to_string(),
        })
    }
}

fn owned_job(t: &Tables, workspace: WorkspaceId, id: JobId) -> StoreResult<&Job> {
    let job = t.jobs.get(&id).ok_or_else(|| StoreError::NotFound {
        entity: "job",
        id: id.to_string(),
    })?;
    ensure_owner("job", id, job.workspace_id, workspace)?;
    Ok(job)
}

impl CreativeStore for MemoryStore {
    fn insert_job(&self, job: &Job) -> StoreResult<()> {
        let mut t = self.tables()?;
        if t.jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        if let Some(key) = &job.idempotency_key {
            let slot = (job.workspace_id, key.clone());
            if let Some(existing) = t.idempotency.get(&slot) {
                return Err(StoreError::DuplicateIdempotencyKey {
                    existing: *existing,
                });
            }
            t.idempotency.insert(slot, job.id);
        }
        t.jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn get_job(&self, workspace: WorkspaceId, id: JobId) -> StoreResult<Job> {
        let t = self.tables()?;
        owned_job(&t, workspace, id).cloned()
    }

    fn update_job(&self, job: &Job) -> StoreResult<()> {
        let mut t = self.tables()?;
        owned_job(&t, job.workspace_id, job.id)?;
        t.jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn find_job_by_idempotency_key(
        &self,
        workspace: WorkspaceId,
        key: &str,
    ) -> StoreResult<Option<Job>> {
        let t = self.tables()?;
        Ok(t
            .idempotency
            .get(&(workspace, key.to_string()))
            .and_then(|id| t.jobs.get(id))
            .cloned())
    }

    fn count_jobs(&self, workspace: WorkspaceId) -> StoreResult<usize> {
        let t = self.tables()?;
        Ok(t.jobs.values().filter(|j| j.workspace_id == workspace).count())
    }

    fn insert_reviewed_blueprints(
        &self,
        workspace: WorkspaceId,
        blueprints: &[Blueprint],
        approval: Option<&ApprovalItem>,
    ) -> StoreResult<()> {
        let mut t = self.tables()?;
        for bp in blueprints {
            ensure_owner("blueprint", bp.id, bp.workspace_id, workspace)?;
            owned_job(&t, workspace, bp.job_id)?;
        }
        if let Some(item) = approval {
            ensure_owner("approval", item.id, item.workspace_id, workspace)?;
            owned_job(&t, workspace, item.job_id)?;
            if t.approvals.contains_key(&item.id) {
                return Err(StoreError::Conflict(format!(
                    "approval {} already exists",
                    item.id
                )));
            }
        }

        for bp in blueprints {
            t.blueprints.entry(bp.job_id).or_default().push(bp.clone());
        }
        if let Some(item) = approval {
            t.approvals.insert(item.id, item.clone());
        }
        Ok(())
    }

    fn list_blueprints(&self, workspace: WorkspaceId, job: JobId) -> StoreResult<Vec<Blueprint>> {
        let t = self.tables()?;
        owned_job(&t, workspace, job)?;
        Ok(t.blueprints.get(&job).cloned().unwrap_or_default())
    }

    fn set_blueprints_approved(
        &self,
        workspace: WorkspaceId,
        job: JobId,
        approved: bool,
    ) -> StoreResult<usize> {
        let mut t = self.tables()?;
        owned_job(&t, workspace, job)?;
        let rows = t.blueprints.entry(job).or_default();
        for bp in rows.iter_mut() {
            bp.approved = approved;
        }
        Ok(rows.len())
    }

    fn insert_asset(&self, asset: &Asset) -> StoreResult<()> {
        let mut t = self.tables()?;
        owned_job(&t, asset.workspace_id, asset.job_id)?;
        t.assets.entry(asset.job_id).or_default().push(asset.clone());
        Ok(())
    }

    fn list_assets(&self, workspace: WorkspaceId, job: JobId) -> StoreResult<Vec<Asset>> {
        let t = self.tables()?;
        owned_job(&t, workspace, job)?;
        Ok(t.assets.get(&job).cloned().unwrap_or_default())
    }

    fn append_claim_decisions(
        &self,
        workspace: WorkspaceId,
        decisions: &[ClaimDecision],
    ) -> StoreResult<()> {
        let mut t = self.tables()?;
        for d in decisions {
            ensure_owner("claim_decision", d.id, d.workspace_id, workspace)?;
            owned_job(&t, workspace, d.job_id)?;
        }
        for d in decisions {
            t.claim_decisions
                .entry(d.job_id)
                .or_default()
                .push(d.clone());
        }
        Ok(())
    }

    fn list_claim_decisions(
        &self,
        workspace: WorkspaceId,
        job: JobId,
    ) -> StoreResult<Vec<ClaimDecision>> {
        let t = self.tables()?;
        owned_job(&t, workspace, job)?;
        Ok(t.claim_decisions.get(&job).cloned().unwrap_or_default())
    }

    fn get_approval(&self, workspace: WorkspaceId, id: ApprovalId) -> StoreResult<ApprovalItem> {
        let t = self.tables()?;
        let item = t.approvals.get(&id).ok_or_else(|| StoreError::NotFound {
            entity: "approval",
            id: id.to_string(),
        })?;
        ensure_owner("approval", id, item.workspace_id, workspace)?;
        Ok(item.clone())
    }

    fn update_approval(&self, item: &ApprovalItem) -> StoreResult<()> {
        let mut t = self.tables()?;
        let stored = t.approvals.get(&item.id).ok_or_else(|| StoreError::NotFound {
            entity: "approval",
            id: item.id.to_string(),
        })?;
        ensure_owner("approval", item.id, stored.workspace_id, item.workspace_id)?;
        t.approvals.insert(item.id, item.clone());
        Ok(())
    }

    fn get_experiment(
        &self,
        workspace: WorkspaceId,
        id: ExperimentId,
    ) -> StoreResult<Option<Experiment>> {
        let t = self.tables()?;
        match t.experiments.get(&id) {
            Some(e) => {
                ensure_owner("experiment", id, e.workspace_id, workspace)?;
                Ok(Some(e.clone()))
            }
            None => Ok(None),
        }
    }

    fn upsert_experiment(&self, experiment: &Experiment) -> StoreResult<()> {
        let mut t = self.tables()?;
        if let Some(existing) = t.experiments.get(&experiment.id) {
            ensure_owner(
                "experiment",
                experiment.id,
                existing.workspace_id,
                experiment.workspace_id,
            )?;
        }
        t.experiments.insert(experiment.id, experiment.clone());
        Ok(())
    }
}

impl CounterStore for MemoryStore {
    fn try_increment(
        &self,
        workspace: WorkspaceId,
        ceiling: usize,
    ) -> adpack_quota::Result<Option<usize>> {
        Ok(cas_increment(&*self.counter(workspace)?, ceiling))
    }

    fn decrement(&self, workspace: WorkspaceId) -> adpack_quota::Result<usize> {
        cas_decrement(&*self.counter(workspace)?).ok_or(QuotaError::Underflow(workspace))
    }

    fn current(&self, workspace: WorkspaceId) -> adpack_quota::Result<usize> {
        Ok(self.counter(workspace)?.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_in(ws: WorkspaceId) -> Job {
        Job::new(ws, JobInput::new(Objective::Sale, "Summer Sale"), 1)
    }

    #[test]
    fn cross_workspace_reads_are_denied() {
        let store = MemoryStore::new();
        let (a, b) = (WorkspaceId::new(), WorkspaceId::new());
        let job = job_in(a);
        store.insert_job(&job).unwrap();

        assert!(store.get_job(a, job.id).is_ok());
        assert!(matches!(
            store.get_job(b, job.id),
            Err(StoreError::AccessDenied { .. })
        ));
        assert!(matches!(
            store.list_assets(b, job.id),
            Err(StoreError::AccessDenied { .. })
        ));
    }

    #[test]
    fn cross_workspace_writes_are_denied() {
        let store = MemoryStore::new();
        let (a, b) = (WorkspaceId::new(), WorkspaceId::new());
        let job = job_in(a);
        store.insert_job(&job).unwrap();

        let mut hijack = job.clone();
        hijack.workspace_id = b;
        assert!(store.update_job(&hijack).is_err());

        let asset = Asset::new(job.id, b, AssetKind::CopyPack, "mem://x", 1);
        assert!(store.insert_asset(&asset).is_err());
        assert!(store.list_assets(a, job.id).unwrap().is_empty());
    }

    #[test]
    fn duplicate_idempotency_key_is_rejected() {
        let store = MemoryStore::new();
        let ws = WorkspaceId::new();
        let mut first = job_in(ws);
        first.idempotency_key = Some("k-1".into());
        store.insert_job(&first).unwrap();

        let mut second = job_in(ws);
        second.idempotency_key = Some("k-1".into());
        match store.insert_job(&second) {
            Err(StoreError::DuplicateIdempotencyKey { existing }) => assert_eq!(existing, first.id),
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(store.count_jobs(ws).unwrap(), 1);

        // Same key in another workspace is a different job.
        let mut other = job_in(WorkspaceId::new());
        other.idempotency_key = Some("k-1".into());
        store.insert_job(&other).unwrap();
        assert_eq!(store.total_jobs(), 2);
    }

    fn blueprint_for(job: &Job) -> Blueprint {
        Blueprint {
            id: BlueprintId::new(),
            job_id: job.id,
            workspace_id: job.workspace_id,
            aspect_ratio: AspectRatio::Square,
            variant: VariantTag::default(),
            duration_s: 15,
            scenes: vec![],
            subtitles: vec![],
            cta: CtaPlacement {
                text: "Shop".into(),
                position: OverlayPosition::Bottom,
                start_s: 12.0,
                end_s: 15.0,
            },
            approved: false,
        }
    }

    fn approval_for(job: &Job) -> ApprovalItem {
        ApprovalItem {
            id: ApprovalId::new(),
            job_id: job.id,
            workspace_id: job.workspace_id,
            risk_level: RiskLevel::High,
            action_type: PUBLISH_CREATIVE.to_string(),
            payload: ApprovalPayload {
                lead_hook: None,
                lead_cta: None,
                formats: vec![AspectRatio::Square],
                compliance_approved: false,
                compliance_issues: vec![],
            },
            state: ApprovalState::Pending,
            reviewer: None,
            decided_ms: None,
            rejection_reason: None,
            created_ms: 1,
        }
    }

    #[test]
    fn blueprints_and_approval_commit_together() {
        let store = MemoryStore::new();
        let ws = WorkspaceId::new();
        let job = job_in(ws);
        store.insert_job(&job).unwrap();
        let item = approval_for(&job);

        store
            .insert_reviewed_blueprints(ws, &[blueprint_for(&job)], Some(&item))
            .unwrap();
        assert_eq!(store.list_blueprints(ws, job.id).unwrap().len(), 1);
        assert_eq!(store.get_approval(ws, item.id).unwrap(), item);

        // a refused approval row keeps the blueprints out as well
        let err = store
            .insert_reviewed_blueprints(ws, &[blueprint_for(&job)], Some(&item))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_blueprints(ws, job.id).unwrap().len(), 1);

        let mut foreign = approval_for(&job);
        foreign.workspace_id = WorkspaceId::new();
        assert!(store
            .insert_reviewed_blueprints(ws, &[blueprint_for(&job)], Some(&foreign))
            .is_err());
        assert_eq!(store.list_blueprints(ws, job.id).unwrap().len(), 1);
        assert!(store.get_approval(ws, foreign.id).is_err());
    }

    #[test]
    fn counters_are_bounded() {
        let store = MemoryStore::new();
        let ws = WorkspaceId::new();
        assert_eq!(store.try_increment(ws, 2).unwrap(), Some(1));
        assert_eq!(store.try_increment(ws, 2).unwrap(), Some(2));
        assert_eq!(store.try_increment(ws, 2).unwrap(), None);
        assert_eq!(store.decrement(ws).unwrap(), 1);
        assert_eq!(store.decrement(ws).unwrap(), 0);
        assert!(store.decrement(ws).is_err());
        assert_eq!(store.current(ws).unwrap(), 0);
    }
}
