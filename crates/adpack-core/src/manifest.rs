//! Export manifest: the deliverable contract handed to media buyers.
//!
//! Everything except `audit.generated_at_ms` is a pure function of the job's
//! assets, so two exports of an unchanged job compare equal once that field
//! is masked. `audit.digest` covers exactly the deterministic part.

use serde::{Deserialize, Serialize};

use crate::approval::ApprovalState;
use crate::blueprint::VariantTag;
use crate::format::AspectRatio;
use crate::hash::Hash256;
use crate::id::{AssetId, JobId, UserId, WorkspaceId};
use crate::job::JobStatus;

/// Where a creative gets published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    FacebookFeed,
    InstagramFeed,
    Youtube,
    Tiktok,
}

impl Destination {
    pub const ALL: [Destination; 4] = [
        Destination::FacebookFeed,
        Destination::InstagramFeed,
        Destination::Youtube,
        Destination::Tiktok,
    ];

    pub fn utm_source(self) -> &'static str {
        match self {
            Destination::FacebookFeed => "facebook",
            Destination::InstagramFeed => "instagram",
            Destination::Youtube => "youtube",
            Destination::Tiktok => "tiktok",
        }
    }

    pub fn utm_medium(self) -> &'static str {
        match self {
            Destination::FacebookFeed | Destination::InstagramFeed => "paid_social",
            Destination::Youtube => "paid_video",
            Destination::Tiktok => "paid_short_form",
        }
    }

    /// Ratio the platform's placement expects.
    pub fn required_ratio(self) -> AspectRatio {
        match self {
            Destination::FacebookFeed | Destination::InstagramFeed => AspectRatio::Square,
            Destination::Youtube => AspectRatio::Landscape,
            Destination::Tiktok => AspectRatio::Vertical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedAsset {
    pub asset_id: AssetId,
    pub filename: String,
    pub location: String,
    pub aspect_ratio: Option<AspectRatio>,
    pub variant: Option<VariantTag>,
    pub render_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedLink {
    pub destination: Destination,
    /// `None` for the base set, `Some` for experiment variant sets.
    pub variant: Option<VariantTag>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub platform: Destination,
    pub required_aspect_ratio: AspectRatio,
    pub satisfied: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCounts {
    pub videos: usize,
    pub thumbnails: usize,
    pub subtitles: usize,
    pub copy_pack: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditManifest {
    pub exported_by: UserId,
    pub generated_at_ms: u64,
    pub engine_version: String,
    pub variants_exported: Vec<VariantTag>,
    pub asset_counts: AssetCounts,
    pub job_status: JobStatus,
    pub compliance_approved: bool,
    pub compliance_issues: Vec<String>,
    pub approval_state: Option<ApprovalState>,
    pub digest: Hash256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub job_id: JobId,
    pub workspace_id: WorkspaceId,
    pub videos: Vec<ExportedAsset>,
    pub thumbnails: Vec<ExportedAsset>,
    pub subtitles: Vec<ExportedAsset>,
    pub copy_pack: Vec<ExportedAsset>,
    pub utm_links: Vec<TrackedLink>,
    pub checklist: Vec<ChecklistEntry>,
    pub audit: AuditManifest,
}

impl ExportManifest {
    pub fn all_filenames(&self) -> Vec<&str> {
        self.videos
            .iter()
            .chain(&self.thumbnails)
            .chain(&self.subtitles)
            .chain(&self.copy_pack)
            .map(|a| a.filename.as_str())
            .collect()
    }
}
