//! Blueprint stage: one generation call per (aspect ratio, variant).

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use adpack_core::format::SafeZone;
use adpack_core::prelude::*;
use adpack_io::{GenerationPurpose, GenerationRequest, GenerationService};

use crate::traits::{extract_json, with_deadline, StageError};

const STAGE: &str = "blueprint";

/// Seconds the fallback CTA stays on screen.
const CTA_TAIL_S: f32 = 3.0;

const SYSTEM: &str = "You design video ad storyboards for a programmatic renderer. Answer with \
a single JSON object {\"duration_s\", \"scenes\", \"subtitles\", \"cta\"}. Each scene has \
start_s, end_s, an optional text_overlay {text, position: top|center|bottom, font_size, \
inside_safe_zone: bool}, an optional asset {kind, source} and an optional transition. Every \
text_overlay MUST declare inside_safe_zone. At most 2 lines of text per screen. Keep all text \
and the CTA inside the safe zone given in pixels.";

#[derive(Debug, Deserialize)]
struct WireBlueprint {
    #[serde(default)]
    duration_s: Option<u32>,
    #[serde(default)]
    scenes: Vec<Scene>,
    #[serde(default)]
    subtitles: Vec<SubtitleCue>,
    #[serde(default)]
    cta: Option<CtaPlacement>,
}

pub struct BlueprintGenerator {
    service: Arc<dyn GenerationService>,
    deadline: Duration,
}

impl BlueprintGenerator {
    pub fn new(service: Arc<dyn GenerationService>, deadline: Duration) -> Self {
        Self { service, deadline }
    }

    /// One blueprint. Variant `i` leads with hook `i` and CTA `i` (rotating).
    pub async fn generate(
        &self,
        job: &Job,
        copy: &CopyPack,
        aspect_ratio: AspectRatio,
        variant_index: usize,
    ) -> Result<Blueprint, StageError> {
        let variant = VariantTag::from_index(variant_index).ok_or_else(|| {
            StageError::InvalidState(Error::Config(format!(
                "variant index {variant_index} exceeds {}",
                VariantTag::MAX
            )))
        })?;
        let hook = copy.hook_for(variant_index).unwrap_or_default();
        let cta = copy.cta_for(variant_index).unwrap_or_default();

        let request = GenerationRequest::json(
            GenerationPurpose::Blueprint {
                aspect_ratio,
                variant,
            },
            SYSTEM,
            prompt(job, copy, aspect_ratio, variant_index, hook, cta),
        );
        let raw = with_deadline(STAGE, self.deadline, self.service.generate(request)).await?;
        parse_blueprint(&raw, job, aspect_ratio, variant, cta)
    }
}

fn safe_zone_guide(aspect_ratio: AspectRatio) -> String {
    let (w, h) = aspect_ratio.dimensions();
    let SafeZone {
        top,
        bottom,
        left,
        right,
        cta_margin,
    } = aspect_ratio.safe_zone();
    format!(
        "Canvas {w}x{h} ({aspect_ratio}). Keep text out of the top {top}px, bottom {bottom}px, \
         left {left}px and right {right}px. The CTA needs a further {cta_margin}px above the \
         bottom margin."
    )
}

fn prompt(
    job: &Job,
    copy: &CopyPack,
    aspect_ratio: AspectRatio,
    variant_index: usize,
    hook: &str,
    cta: &str,
) -> String {
    let script = copy
        .scripts
        .get(variant_index % copy.scripts.len().max(1))
        .map(|s| s.text.as_str())
        .unwrap_or_default();
    let headline = copy.headline_for(variant_index).unwrap_or_default();
    let mut p = format!(
        "{}\nDuration: {} seconds\nOpening hook: {hook}\nHeadline: {headline}\nScript: {script}\nCTA: {cta}\n",
        safe_zone_guide(aspect_ratio),
        job.input.duration_s,
    );
    if let Some(logo) = &job.input.logo_url {
        p.push_str(&format!("Logo: {logo}\n"));
    }
    for image in &job.input.product_images {
        p.push_str(&format!("Product image: {image}\n"));
    }
    p
}

/// Parse one blueprint answer. Empty or non-monotonic scenes are malformed.
pub fn parse_blueprint(
    raw: &str,
    job: &Job,
    aspect_ratio: AspectRatio,
    variant: VariantTag,
    cta_text: &str,
) -> Result<Blueprint, StageError> {
    let wire: WireBlueprint = serde_json::from_str(extract_json(raw))
        .map_err(|e| StageError::malformed(STAGE, format!("{aspect_ratio} {variant}: {e}")))?;

    if wire.scenes.is_empty() {
        return Err(StageError::malformed(
            STAGE,
            format!("{aspect_ratio} {variant}: no scenes"),
        ));
    }
    for (i, scene) in wire.scenes.iter().enumerate() {
        if scene.start_s < 0.0 || scene.end_s <= scene.start_s {
            return Err(StageError::malformed(
                STAGE,
                format!(
                    "{aspect_ratio} {variant}: scene {i} has invalid timing {}..{}",
                    scene.start_s, scene.end_s
                ),
            ));
        }
    }

    let duration_s = wire.duration_s.unwrap_or(job.input.duration_s);
    let cta = match wire.cta {
        Some(cta) if !cta.text.trim().is_empty() => cta,
        _ => {
            let end = duration_s as f32;
            CtaPlacement {
                text: cta_text.to_string(),
                position: OverlayPosition::Bottom,
                start_s: (end - CTA_TAIL_S).max(0.0),
                end_s: end,
            }
        }
    };

    Ok(Blueprint {
        id: BlueprintId::new(),
        job_id: job.id,
        workspace_id: job.workspace_id,
        aspect_ratio,
        variant,
        duration_s,
        scenes: wire.scenes,
        subtitles: wire.subtitles,
        cta,
        approved: false,
    })
}
