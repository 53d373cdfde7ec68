//! Engine: owns the configuration and the collaborators every stage needs.

use std::sync::Arc;

use adpack_core::config::PipelineConfig;
use adpack_core::id::{JobId, WorkspaceId};
use adpack_core::job::Job;
use adpack_core::quota::{Admission, QuotaGate};
use adpack_io::{CreativeStore, GenerationService, MemoryStore, RenderService};
use adpack_quota::{QuotaManager, SlotGuard};

use crate::error::{PipelineError, Result};

#[derive(Clone)]
pub struct Engine {
    pub(crate) cfg: PipelineConfig,
    pub(crate) store: Arc<dyn CreativeStore>,
    pub(crate) quota: QuotaManager,
    pub(crate) generation: Arc<dyn GenerationService>,
    pub(crate) renderer: Arc<dyn RenderService>,
}

impl Engine {
    pub fn new(
        cfg: PipelineConfig,
        store: Arc<dyn CreativeStore>,
        quota: QuotaManager,
        generation: Arc<dyn GenerationService>,
        renderer: Arc<dyn RenderService>,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            store,
            quota,
            generation,
            renderer,
        })
    }

    /// Engine over a fresh [`MemoryStore`] that also holds the quota counters.
    pub fn in_memory(
        cfg: PipelineConfig,
        generation: Arc<dyn GenerationService>,
        renderer: Arc<dyn RenderService>,
    ) -> Result<Self> {
        let store = MemoryStore::new();
        let quota = QuotaManager::new(Arc::new(store.clone()), cfg.max_concurrent_per_workspace);
        Self::new(cfg, Arc::new(store), quota, generation, renderer)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn store(&self) -> Arc<dyn CreativeStore> {
        Arc::clone(&self.store)
    }

    pub fn quota(&self) -> &QuotaManager {
        &self.quota
    }

    /// Job detail, workspace-scoped.
    pub fn job(&self, workspace: WorkspaceId, id: JobId) -> Result<Job> {
        Ok(self.store.get_job(workspace, id)?)
    }

    /// Take a quota slot for `stage` or fail with the admission error.
    pub(crate) fn admit(&self, workspace: WorkspaceId, stage: &'static str) -> Result<SlotGuard> {
        match self.quota.try_admit(workspace, stage) {
            Admission::Granted(slot) => Ok(slot),
            Admission::Denied { in_flight, ceiling } => {
                tracing::warn!(%workspace, stage, in_flight, ceiling, "quota exceeded");
                Err(PipelineError::QuotaExceeded { in_flight, ceiling })
            }
            Admission::Unavailable(reason) => Err(PipelineError::QuotaUnavailable(reason)),
        }
    }
}
