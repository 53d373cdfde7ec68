//! Render phase: one approved blueprint per aspect ratio, rendered independently.
//!
//! A format fails on its own (missing blueprint, submit error, terminal
//! `failed`, polling exhausted) without stopping the loop. Results are merged
//! into the job per (format, variant); the job ends `done` when at least one
//! format of the requested variant has a video, `failed` otherwise. A failed
//! render can be retried, for every format or only the ones still missing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use adpack_core::now_millis;
use adpack_core::prelude::*;
use adpack_io::{RenderElement, RenderElementKind, RenderError, RenderStatus, SceneDescription};

use crate::error::{PipelineError, Result};
use crate::metrics::StageTimer;
use crate::runtime::Engine;
use crate::settle::SettleGuard;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Variant to render in every format; `A` when absent.
    #[serde(default)]
    pub variant: Option<VariantTag>,
    /// Restrict the call to these formats; every format when absent.
    #[serde(default)]
    pub formats: Option<Vec<AspectRatio>>,
    /// Skip formats that already have a video of the variant.
    #[serde(default)]
    pub missing_only: bool,
}

impl RenderRequest {
    pub fn for_formats(formats: impl IntoIterator<Item = AspectRatio>) -> Self {
        Self {
            formats: Some(formats.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn missing_only() -> Self {
        Self {
            missing_only: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Formats rendered by this call.
    pub renders: Vec<RenderResult>,
    pub duration_ms: u64,
    /// Cost of this render call only.
    pub cost_estimate_cents: u64,
}

struct Rendered {
    render_id: String,
    url: String,
    thumbnail_url: Option<String>,
}

struct FormatFailure {
    render_id: Option<String>,
    reason: String,
}

impl FormatFailure {
    fn new(render_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            render_id,
            reason: reason.into(),
        }
    }
}

impl Engine {
    pub async fn render(
        &self,
        workspace: WorkspaceId,
        job_id: JobId,
        request: RenderRequest,
    ) -> Result<RenderSummary> {
        let mut job = self.store.get_job(workspace, job_id)?;
        let blueprints = self.store.list_blueprints(workspace, job_id)?;
        let retry = job.status == JobStatus::Failed && blueprints.iter().any(|b| b.approved);
        if job.status != JobStatus::Done && !retry {
            return Err(PipelineError::InvalidState(format!(
                "job {} is {}; only done jobs, or failed jobs with approved blueprints, can be rendered",
                job.id, job.status
            )));
        }

        let variant = request.variant.unwrap_or_default();
        let formats = self.select_formats(&job, variant, &request)?;

        let _slot = self.admit(workspace, "render")?;
        let settled_before = job.status;

        let timer = StageTimer::start("render", job.id);
        job.transition(JobStatus::Running, now_millis())?;
        self.store.update_job(&job)?;
        let settle = SettleGuard::arm(
            self.store.clone(),
            &job,
            settled_before,
            "render interrupted before the job settled",
        );

        let mut results = Vec::with_capacity(formats.len());
        let mut cost = 0u64;

        for aspect_ratio in formats {
            let blueprint = blueprints
                .iter()
                .find(|b| b.aspect_ratio == aspect_ratio && b.variant == variant && b.approved);

            let outcome = match blueprint {
                None => Err(FormatFailure::new(
                    None,
                    format!("no approved blueprint for {aspect_ratio} variant {variant}"),
                )),
                Some(bp) => match self.render_one(&job, bp).await {
                    Ok(done) => self.record_assets(&job, bp, &done).map(|thumbs| {
                        cost += self.cfg.render_cost_cents
                            + thumbs as u64 * self.cfg.thumbnail_cost_cents;
                        done
                    }),
                    Err(failure) => Err(failure),
                },
            };

            let result = match outcome {
                Ok(done) => {
                    tracing::info!(job_id = %job.id, %aspect_ratio, %variant, render_id = %done.render_id, "format rendered");
                    RenderResult {
                        aspect_ratio,
                        variant,
                        render_id: Some(done.render_id),
                        url: Some(done.url),
                        error: None,
                    }
                }
                Err(failure) => {
                    tracing::warn!(job_id = %job.id, %aspect_ratio, %variant, error = %failure.reason, "format failed");
                    RenderResult {
                        aspect_ratio,
                        variant,
                        render_id: failure.render_id,
                        url: None,
                        error: Some(failure.reason),
                    }
                }
            };
            results.push(result);
        }

        job.renders = merge_renders(&job.renders, &results);
        let succeeded = job
            .renders
            .iter()
            .filter(|r| r.variant == variant && r.succeeded())
            .count();
        if succeeded > 0 {
            job.transition(JobStatus::Done, now_millis())?;
            job.error = None;
        } else {
            job.fail("no format rendered successfully", now_millis())?;
        }

        let elapsed = timer.finish(succeeded > 0);
        job.cost_estimate_cents += cost;
        job.duration_ms += elapsed;
        self.store.update_job(&job)?;
        settle.disarm();

        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            retry,
            rendered = results.iter().filter(|r| r.succeeded()).count(),
            cost_cents = cost,
            "render settled"
        );
        Ok(RenderSummary {
            job_id: job.id,
            status: job.status,
            renders: results,
            duration_ms: elapsed,
            cost_estimate_cents: cost,
        })
    }

    /// Formats this call renders, in canonical order.
    fn select_formats(
        &self,
        job: &Job,
        variant: VariantTag,
        request: &RenderRequest,
    ) -> Result<Vec<AspectRatio>> {
        let mut formats: Vec<AspectRatio> = AspectRatio::ALL
            .into_iter()
            .filter(|r| request.formats.as_ref().map_or(true, |f| f.contains(r)))
            .collect();

        if request.missing_only {
            let videos = self.store.list_assets(job.workspace_id, job.id)?;
            formats.retain(|r| {
                !videos.iter().any(|a| {
                    a.kind == AssetKind::Video
                        && a.aspect_ratio == Some(*r)
                        && a.variant == Some(variant)
                })
            });
        }

        if formats.is_empty() {
            return Err(PipelineError::InvalidState(format!(
                "job {} has nothing to render for variant {variant}",
                job.id
            )));
        }
        Ok(formats)
    }

    /// Submit and poll one blueprint to a terminal state.
    async fn render_one(
        &self,
        job: &Job,
        bp: &Blueprint,
    ) -> std::result::Result<Rendered, FormatFailure> {
        let deadline = self.cfg.stage_timeout();
        let scene = scene_description(job, bp);

        let render_id = deadline_call(deadline, self.renderer.submit(&scene))
            .await
            .map_err(|e| FormatFailure::new(None, format!("submit failed: {e}")))?;

        let attempts = self.cfg.render_poll_max_attempts;
        for attempt in 1..=attempts {
            match deadline_call(deadline, self.renderer.poll(&render_id)).await {
                Ok(poll) => match poll.status {
                    RenderStatus::Done => {
                        return match poll.url {
                            Some(url) if !url.trim().is_empty() => Ok(Rendered {
                                render_id,
                                url,
                                thumbnail_url: poll.thumbnail_url,
                            }),
                            _ => Err(FormatFailure::new(
                                Some(render_id),
                                "render finished without a video url",
                            )),
                        };
                    }
                    RenderStatus::Failed => {
                        let reason = poll.error.unwrap_or_else(|| "unknown error".to_string());
                        return Err(FormatFailure::new(
                            Some(render_id),
                            format!("render failed: {reason}"),
                        ));
                    }
                    RenderStatus::Pending | RenderStatus::Processing => {}
                },
                // a poll that errors still uses up an attempt
                Err(e) => {
                    tracing::warn!(%render_id, attempt, error = %e, "render poll failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.cfg.render_poll_interval()).await;
            }
        }

        Err(FormatFailure::new(
            Some(render_id),
            format!("render not finished after {attempts} polls"),
        ))
    }

    /// Persist the video (+ thumbnail, + subtitles) of one rendered format.
    /// Returns the number of thumbnails written.
    fn record_assets(
        &self,
        job: &Job,
        bp: &Blueprint,
        done: &Rendered,
    ) -> std::result::Result<usize, FormatFailure> {
        let now = now_millis();
        let (width, height) = bp.aspect_ratio.dimensions();
        let store_err = |e: adpack_io::StoreError| {
            FormatFailure::new(Some(done.render_id.clone()), format!("storing assets: {e}"))
        };

        let video = Asset::new(job.id, job.workspace_id, AssetKind::Video, &done.url, now)
            .with_format(bp.aspect_ratio, bp.variant)
            .with_render_id(&done.render_id)
            .with_metadata(serde_json::json!({
                "blueprint_id": bp.id,
                "duration_s": bp.duration_s,
                "width": width,
                "height": height,
            }));
        self.store.insert_asset(&video).map_err(store_err)?;

        let mut thumbnails = 0;
        if let Some(thumb) = done.thumbnail_url.as_deref().filter(|t| !t.trim().is_empty()) {
            let asset = Asset::new(job.id, job.workspace_id, AssetKind::Thumbnail, thumb, now)
                .with_format(bp.aspect_ratio, bp.variant)
                .with_render_id(&done.render_id);
            self.store.insert_asset(&asset).map_err(store_err)?;
            thumbnails += 1;
        }

        if !bp.subtitles.is_empty() {
            let asset = Asset::new(
                job.id,
                job.workspace_id,
                AssetKind::Subtitle,
                format!(
                    "store://{}/{}/{}_{}.srt",
                    job.workspace_id,
                    job.id,
                    bp.aspect_ratio.file_token(),
                    bp.variant
                ),
                now,
            )
            .with_format(bp.aspect_ratio, bp.variant)
            .with_render_id(&done.render_id)
            .with_metadata(serde_json::json!({ "srt": to_srt(&bp.subtitles) }));
            self.store.insert_asset(&asset).map_err(store_err)?;
        }

        Ok(thumbnails)
    }
}

/// Replace the stored result of every (format, variant) rendered again.
fn merge_renders(previous: &[RenderResult], fresh: &[RenderResult]) -> Vec<RenderResult> {
    let mut merged: Vec<RenderResult> = previous
        .iter()
        .filter(|p| {
            !fresh
                .iter()
                .any(|f| f.aspect_ratio == p.aspect_ratio && f.variant == p.variant)
        })
        .cloned()
        .chain(fresh.iter().cloned())
        .collect();
    merged.sort_by_key(|r| (r.variant, r.aspect_ratio));
    merged
}

async fn deadline_call<T, F>(deadline: Duration, call: F) -> std::result::Result<T, RenderError>
where
    F: std::future::Future<Output = std::result::Result<T, RenderError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(RenderError::Timeout(deadline.as_millis() as u64)))
}

fn position_name(p: OverlayPosition) -> String {
    match p {
        OverlayPosition::Top => "top",
        OverlayPosition::Center => "center",
        OverlayPosition::Bottom => "bottom",
    }
    .to_string()
}

/// Translate a blueprint into the render service's flat element list.
pub fn scene_description(job: &Job, bp: &Blueprint) -> SceneDescription {
    let (width, height) = bp.aspect_ratio.dimensions();
    let mut elements = Vec::new();

    for scene in &bp.scenes {
        if let Some(asset) = &scene.asset {
            let source = asset.source.clone().or_else(|| match asset.kind.as_str() {
                "logo" => job.input.logo_url.clone(),
                "product" => job.input.product_images.first().cloned(),
                _ => None,
            });
            if let Some(source) = source {
                let kind = if source.ends_with(".mp4") || asset.kind == "broll" {
                    RenderElementKind::Video
                } else {
                    RenderElementKind::Image
                };
                elements.push(RenderElement {
                    kind,
                    start_s: scene.start_s,
                    end_s: scene.end_s,
                    text: None,
                    source: Some(source),
                    position: None,
                    font_size: None,
                    transition: scene.transition.clone(),
                });
            }
        }
        if let Some(overlay) = &scene.text_overlay {
            elements.push(RenderElement {
                kind: RenderElementKind::Text,
                start_s: scene.start_s,
                end_s: scene.end_s,
                text: Some(overlay.text.clone()),
                source: None,
                position: Some(position_name(overlay.position)),
                font_size: Some(overlay.font_size),
                transition: scene.transition.clone(),
            });
        }
    }

    for cue in &bp.subtitles {
        elements.push(RenderElement {
            kind: RenderElementKind::Subtitle,
            start_s: cue.start_s,
            end_s: cue.end_s,
            text: Some(cue.text.clone()),
            source: None,
            position: Some("bottom".to_string()),
            font_size: None,
            transition: None,
        });
    }

    elements.push(RenderElement {
        kind: RenderElementKind::Text,
        start_s: bp.cta.start_s,
        end_s: bp.cta.end_s,
        text: Some(bp.cta.text.clone()),
        source: None,
        position: Some(position_name(bp.cta.position)),
        font_size: None,
        transition: None,
    });

    SceneDescription {
        width,
        height,
        duration_s: bp.duration_s,
        output_format: "mp4".to_string(),
        elements,
    }
}

fn srt_timestamp(seconds: f32) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (h, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, ms) = (rem / 1000, rem % 1000);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// SubRip text for a cue list.
pub fn to_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(cue.start_s),
            srt_timestamp(cue.end_s),
            cue.text.trim()
        ));
    }
    out
}
