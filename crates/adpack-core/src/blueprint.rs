//! Renderer-agnostic description of one creative (one ratio, one variant).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::format::AspectRatio;
use crate::id::{BlueprintId, JobId, WorkspaceId};

/// Variant label `A`, `B`, ... derived from the generating index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantTag(u8);

impl VariantTag {
    pub const MAX: usize = 26;

    pub fn from_index(index: usize) -> Option<Self> {
        if index < Self::MAX {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn letter(self) -> char {
        (b'A' + self.0) as char
    }
}

impl Default for VariantTag {
    fn default() -> Self {
        Self(0)
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for VariantTag {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let mut chars = t.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                Ok(Self(c.to_ascii_uppercase() as u8 - b'A'))
            }
            _ => Err(crate::error::Error::Parse(format!(
                "variant tag must be a single letter, got '{t}'"
            ))),
        }
    }
}

impl Serialize for VariantTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VariantTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub position: OverlayPosition,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Must be declared. `None` means the generator omitted it, which the
    /// compliance gate treats as a violation.
    #[serde(default)]
    pub inside_safe_zone: Option<bool>,
}

fn default_font_size() -> u32 {
    48
}

impl TextOverlay {
    pub fn line_count(&self) -> usize {
        self.text.lines().filter(|l| !l.trim().is_empty()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPlaceholder {
    /// `logo`, `product`, `broll`, ...
    pub kind: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub start_s: f32,
    pub end_s: f32,
    #[serde(default)]
    pub text_overlay: Option<TextOverlay>,
    #[serde(default)]
    pub asset: Option<AssetPlaceholder>,
    #[serde(default)]
    pub transition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start_s: f32,
    pub end_s: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtaPlacement {
    pub text: String,
    pub position: OverlayPosition,
    pub start_s: f32,
    pub end_s: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: BlueprintId,
    pub job_id: JobId,
    pub workspace_id: WorkspaceId,
    pub aspect_ratio: AspectRatio,
    pub variant: VariantTag,
    pub duration_s: u32,
    pub scenes: Vec<Scene>,
    pub subtitles: Vec<SubtitleCue>,
    pub cta: CtaPlacement,
    pub approved: bool,
}

impl Blueprint {
    pub fn overlays(&self) -> impl Iterator<Item = (usize, &TextOverlay)> {
        self.scenes
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.text_overlay.as_ref().map(|o| (i, o)))
    }

    /// `A@9:16` style label used in logs and compliance summaries.
    pub fn label(&self) -> String {
        format!("{}@{}", self.variant, self.aspect_ratio)
    }
}
