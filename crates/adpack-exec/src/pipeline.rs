//! Init phase: admit, create the job, then copy → guardrail → blueprints →
//! compliance → escalation, strictly in sequence.
//!
//! Stage failures settle the job as `failed` with the stage's message and are
//! reported through [`InitSummary`], not as an `Err`. Only admission, input,
//! and store problems are errors.

use serde::{Deserialize, Serialize};

use adpack_core::prelude::*;
use adpack_core::now_millis;
use adpack_io::StoreError;
use adpack_stages::{
    guard_copy_pack, ApprovalEscalator, BlueprintGenerator, ComplianceValidator, CopyGenerator,
    StageError,
};

use crate::error::Result;
use crate::metrics::StageTimer;
use crate::runtime::Engine;
use crate::settle::SettleGuard;

/// Body of an init call (workspace comes from the route/auth layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitRequest {
    #[serde(flatten)]
    pub input: JobInput,
    #[serde(default)]
    pub site_id: Option<SiteId>,
    #[serde(default)]
    pub experiment_id: Option<ExperimentId>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl InitRequest {
    pub fn new(input: JobInput) -> Self {
        Self {
            input,
            site_id: None,
            experiment_id: None,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// What the caller sees after init (also the replay answer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub approval_id: Option<ApprovalId>,
    pub copywriting_preview: Option<CopyPack>,
    pub compliance_verdict: Option<ComplianceVerdict>,
    pub cost_estimate_cents: u64,
    pub blueprint_count: usize,
    pub error: Option<String>,
    pub idempotent_replay: bool,
}

impl InitSummary {
    pub fn from_job(job: &Job, replay: bool) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            approval_id: job.approval_id,
            copywriting_preview: job.copy.clone(),
            compliance_verdict: job.compliance.clone(),
            cost_estimate_cents: job.cost_estimate_cents,
            blueprint_count: job.blueprint_count,
            error: job.error.clone(),
            idempotent_replay: replay,
        }
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

impl Engine {
    pub async fn init(&self, workspace: WorkspaceId, request: InitRequest) -> Result<InitSummary> {
        request.input.validate()?;
        let key = normalize_key(request.idempotency_key);

        if let Some(k) = &key {
            if let Some(existing) = self.store.find_job_by_idempotency_key(workspace, k)? {
                tracing::info!(job_id = %existing.id, %workspace, "idempotent replay");
                return Ok(InitSummary::from_job(&existing, true));
            }
        }

        // Held until this function returns or unwinds.
        let _slot = self.admit(workspace, "init")?;

        let started = now_millis();
        let mut job = Job::new(workspace, request.input, started);
        job.site_id = request.site_id;
        job.experiment_id = request.experiment_id;
        job.idempotency_key = key;

        match self.store.insert_job(&job) {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey { existing }) => {
                // lost a race with a concurrent init using the same key
                let existing = self.store.get_job(workspace, existing)?;
                return Ok(InitSummary::from_job(&existing, true));
            }
            Err(e) => return Err(e.into()),
        }

        job.transition(JobStatus::Running, now_millis())?;
        self.store.update_job(&job)?;
        let settle = SettleGuard::arm(
            self.store.clone(),
            &job,
            JobStatus::Failed,
            "init interrupted before the job settled",
        );
        tracing::info!(job_id = %job.id, %workspace, offer = %job.input.offer, "init started");

        if let Err(e) = self.run_stages(&mut job).await {
            let reason = e.to_string();
            tracing::warn!(job_id = %job.id, error = %reason, "init failed");
            job.fail(reason, now_millis())?;
        }
        job.duration_ms = now_millis().saturating_sub(started);
        self.store.update_job(&job)?;
        settle.disarm();

        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            cost_cents = job.cost_estimate_cents,
            duration_ms = job.duration_ms,
            "init settled"
        );
        Ok(InitSummary::from_job(&job, false))
    }

    /// Runs every stage; on `Err` the caller marks the job failed. A failed
    /// stage writes nothing; output of the stages before it stays.
    async fn run_stages(&self, job: &mut Job) -> std::result::Result<(), StageFailure> {
        let deadline = self.cfg.stage_timeout();
        let call_cost = self.cfg.generation_call_cost_cents;

        // --- copy + guardrail ---
        crate::fail_point!("panic_before_copy");
        let timer = StageTimer::start("copy", job.id);
        job.cost_estimate_cents += call_cost;
        let raw_copy = CopyGenerator::new(self.generation.clone(), deadline)
            .generate(&job.input)
            .await;
        timer.finish(raw_copy.is_ok());
        let raw_copy = raw_copy?;

        let (copy, decisions) = guard_copy_pack(&raw_copy, job, now_millis());
        self.store.append_claim_decisions(job.workspace_id, &decisions)?;
        let copy_asset = Asset::new(
            job.id,
            job.workspace_id,
            AssetKind::CopyPack,
            format!("store://{}/{}/copy_pack.json", job.workspace_id, job.id),
            now_millis(),
        )
        .with_metadata(
            serde_json::to_value(&copy).map_err(|e| StageFailure(format!("copy pack: {e}")))?,
        );
        self.store.insert_asset(&copy_asset)?;
        job.copy = Some(copy.clone());

        // --- blueprints: all or nothing ---
        crate::fail_point!("panic_before_blueprints");
        let timer = StageTimer::start("blueprint", job.id);
        let generator = BlueprintGenerator::new(self.generation.clone(), deadline);
        let mut blueprints = Vec::with_capacity(self.cfg.blueprints_per_job());
        for aspect_ratio in AspectRatio::ALL {
            for i in 0..self.cfg.variants_per_format {
                job.cost_estimate_cents += call_cost;
                match generator.generate(job, &copy, aspect_ratio, i).await {
                    Ok(bp) => blueprints.push(bp),
                    Err(e) => {
                        timer.finish(false);
                        return Err(e.into());
                    }
                }
            }
        }
        timer.finish(true);

        // --- compliance (never errors) ---
        crate::fail_point!("panic_before_compliance");
        let timer = StageTimer::start("compliance", job.id);
        job.cost_estimate_cents += call_cost;
        let verdict = ComplianceValidator::new(self.generation.clone(), deadline)
            .validate(&copy, &blueprints)
            .await;
        timer.finish(verdict.approved);

        if verdict.approved {
            for bp in &mut blueprints {
                bp.approved = true;
            }
        }

        // --- escalation; blueprints and their approval item land together ---
        let escalator = ApprovalEscalator::new(self.cfg.publish_policy);
        let item = escalator.escalate(job, &verdict, &AspectRatio::ALL, now_millis());
        self.store
            .insert_reviewed_blueprints(job.workspace_id, &blueprints, item.as_ref())?;
        job.blueprint_count = blueprints.len();
        if let Some(item) = item {
            job.approval_id = Some(item.id);
            tracing::info!(
                job_id = %job.id,
                approval_id = %item.id,
                compliance_approved = verdict.approved,
                "approval item created"
            );
        }
        job.transition(ApprovalEscalator::settled_status(&verdict), now_millis())
            .map_err(|e| StageFailure(e.to_string()))?;
        job.compliance = Some(verdict);
        Ok(())
    }
}

/// Message of a failed stage, stored on the job.
#[derive(Debug)]
struct StageFailure(String);

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<StageError> for StageFailure {
    fn from(e: StageError) -> Self {
        StageFailure(e.to_string())
    }
}

impl From<StoreError> for StageFailure {
    fn from(e: StoreError) -> Self {
        StageFailure(e.to_string())
    }
}
