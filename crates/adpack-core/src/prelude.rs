//! Convenient re-exports for downstream crates.

pub use crate::approval::{
    ApprovalItem, ApprovalPayload, ApprovalState, ReviewDecision, RiskLevel, PUBLISH_CREATIVE,
};
pub use crate::asset::{Asset, AssetKind};
pub use crate::blueprint::{
    AssetPlaceholder, Blueprint, CtaPlacement, OverlayPosition, Scene, SubtitleCue, TextOverlay,
    VariantTag,
};
pub use crate::config::{PipelineConfig, PublishPolicy, ServiceConfig};
pub use crate::copy::{ClaimDecision, ClaimOutcome, CopyField, CopyPack, Script};
pub use crate::error::Error;
pub use crate::experiment::Experiment;
pub use crate::format::{AspectRatio, SafeZone};
pub use crate::id::{
    ApprovalId, AssetId, BlueprintId, ClaimDecisionId, ExperimentId, JobId, SiteId, UserId,
    WorkspaceId,
};
pub use crate::job::{ComplianceVerdict, Job, JobInput, JobStatus, Objective, RenderResult};
pub use crate::manifest::ExportManifest;
