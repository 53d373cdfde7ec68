//! Produced deliverables.

use serde::{Deserialize, Serialize};

use crate::blueprint::VariantTag;
use crate::format::AspectRatio;
use crate::id::{AssetId, JobId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Video,
    Thumbnail,
    Subtitle,
    CopyPack,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Thumbnail => "thumbnail",
            AssetKind::Subtitle => "subtitle",
            AssetKind::CopyPack => "copy_pack",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Video => "mp4",
            AssetKind::Thumbnail => "jpg",
            AssetKind::Subtitle => "srt",
            AssetKind::CopyPack => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub job_id: JobId,
    pub workspace_id: WorkspaceId,
    pub kind: AssetKind,
    /// URL or store key of the stored bytes.
    pub location: String,
    pub aspect_ratio: Option<AspectRatio>,
    pub variant: Option<VariantTag>,
    pub render_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_ms: u64,
}

impl Asset {
    pub fn new(
        job_id: JobId,
        workspace_id: WorkspaceId,
        kind: AssetKind,
        location: impl Into<String>,
        created_ms: u64,
    ) -> Self {
        Self {
            id: AssetId::new(),
            job_id,
            workspace_id,
            kind,
            location: location.into(),
            aspect_ratio: None,
            variant: None,
            render_id: None,
            metadata: serde_json::Value::Null,
            created_ms,
        }
    }

    pub fn with_format(mut self, aspect_ratio: AspectRatio, variant: VariantTag) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self.variant = Some(variant);
        self
    }

    pub fn with_render_id(mut self, render_id: impl Into<String>) -> Self {
        self.render_id = Some(render_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
