//! Export assembly.
//!
//! The manifest is a pure function of the job row, its assets, its approval
//! and experiment rows, plus the exporter. Only `audit.generated_at_ms`
//! varies between two exports of an unchanged job; `audit.digest` is computed
//! with that field zeroed.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use adpack_core::hash::{hash_serde, Hash256};
use adpack_core::manifest::{
    AssetCounts, AuditManifest, ChecklistEntry, Destination, ExportedAsset, TrackedLink,
};
use adpack_core::now_millis;
use adpack_core::prelude::*;

use crate::error::{PipelineError, Result};
use crate::runtime::Engine;

const SLUG_MAX: usize = 40;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_include_utm")]
    pub include_utm: bool,
    /// Replaces the experiment's declared variants for the extra link sets.
    #[serde(default)]
    pub variant_override: Option<Vec<VariantTag>>,
}

fn default_include_utm() -> bool {
    true
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_utm: true,
            variant_override: None,
        }
    }
}

impl Engine {
    pub fn export(
        &self,
        workspace: WorkspaceId,
        job_id: JobId,
        exporter: UserId,
        options: &ExportOptions,
    ) -> Result<ExportManifest> {
        let job = self.store.get_job(workspace, job_id)?;
        let assets = self.store.list_assets(workspace, job_id)?;
        if assets.is_empty() {
            return Err(PipelineError::NotFound {
                entity: "assets of job",
                id: job_id.to_string(),
            });
        }

        let approval_state = match job.approval_id {
            Some(id) => Some(self.store.get_approval(workspace, id)?.state),
            None => None,
        };

        let variants = match &options.variant_override {
            Some(list) => list.clone(),
            None => match job.experiment_id {
                Some(id) => self
                    .store
                    .get_experiment(workspace, id)?
                    .map(|e| e.variants)
                    .unwrap_or_default(),
                None => Vec::new(),
            },
        };
        let links = if options.include_utm {
            tracked_links(&job, &variants)
        } else {
            Vec::new()
        };

        let manifest = assemble(&job, assets, links, approval_state, exporter, now_millis())?;
        tracing::info!(
            job_id = %job.id,
            videos = manifest.videos.len(),
            links = manifest.utm_links.len(),
            digest = %manifest.audit.digest,
            "export assembled"
        );
        Ok(manifest)
    }
}

/// Lowercase ASCII slug: accents folded, everything else collapsed to `-`.
pub fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;

    for c in s.chars().flat_map(char::to_lowercase) {
        let folded = fold_accent(c);
        for f in folded.chars() {
            if f.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(f);
            } else {
                pending_dash = true;
            }
        }
    }

    if out.len() > SLUG_MAX {
        out.truncate(SLUG_MAX);
        while out.ends_with('-') {
            out.pop();
        }
    }
    if out.is_empty() {
        out.push_str("untitled");
    }
    out
}

fn fold_accent(c: char) -> String {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'œ' => "oe",
        'æ' => "ae",
        'ß' => "ss",
        other => return other.to_string(),
    };
    base.to_string()
}

fn creation_date(job: &Job) -> String {
    Utc.timestamp_millis_opt(job.created_ms as i64)
        .single()
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "00000000".to_string())
}

/// `{brand}_{offer}_{format}[_{variant}]_{type}_{yyyymmdd}.{ext}`
pub fn asset_filename(job: &Job, asset: &Asset) -> String {
    let format = asset
        .aspect_ratio
        .map(AspectRatio::file_token)
        .unwrap_or("all");
    let variant = asset
        .variant
        .map(|v| format!("_{v}"))
        .unwrap_or_default();
    format!(
        "{}_{}_{}{}_{}_{}.{}",
        slug(job.brand()),
        slug(&job.input.offer),
        format,
        variant,
        asset.kind.as_str(),
        creation_date(job),
        asset.kind.extension()
    )
}

fn landing_url(job: &Job) -> Option<Url> {
    let raw = job.input.site_url.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{raw}")))
        .ok()
}

/// One link per destination, then one more set per variant.
pub fn tracked_links(job: &Job, variants: &[VariantTag]) -> Vec<TrackedLink> {
    let Some(base) = landing_url(job) else {
        tracing::warn!(job_id = %job.id, "no usable site_url; tracked links skipped");
        return Vec::new();
    };
    let campaign = slug(&job.input.offer);

    let sets = std::iter::once(None).chain(variants.iter().copied().map(Some));
    let mut links = Vec::new();
    for variant in sets {
        for destination in Destination::ALL {
            let mut url = base.clone();
            {
                let mut q = url.query_pairs_mut();
                q.append_pair("utm_source", destination.utm_source())
                    .append_pair("utm_medium", destination.utm_medium())
                    .append_pair("utm_campaign", &campaign);
                if let Some(v) = variant {
                    q.append_pair("utm_content", &format!("variant_{v}"));
                }
            }
            links.push(TrackedLink {
                destination,
                variant,
                url: url.to_string(),
            });
        }
    }
    links
}

/// Build the manifest from already-loaded rows.
pub fn assemble(
    job: &Job,
    mut assets: Vec<Asset>,
    utm_links: Vec<TrackedLink>,
    approval_state: Option<ApprovalState>,
    exporter: UserId,
    generated_at_ms: u64,
) -> Result<ExportManifest> {
    assets.sort_by(|a, b| {
        (a.kind, a.aspect_ratio, a.variant, a.created_ms, a.id)
            .cmp(&(b.kind, b.aspect_ratio, b.variant, b.created_ms, b.id))
    });

    let mut used = std::collections::HashSet::new();
    let (mut videos, mut thumbnails, mut subtitles, mut copy_pack) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new());

    for asset in &assets {
        let mut filename = asset_filename(job, asset);
        // re-renders produce a second asset for the same slot
        let mut n = 2;
        while !used.insert(filename.clone()) {
            let base = asset_filename(job, asset);
            let (stem, ext) = base.rsplit_once('.').unwrap_or((base.as_str(), ""));
            filename = format!("{stem}_{n}.{ext}");
            n += 1;
        }
        let exported = ExportedAsset {
            asset_id: asset.id,
            filename,
            location: asset.location.clone(),
            aspect_ratio: asset.aspect_ratio,
            variant: asset.variant,
            render_id: asset.render_id.clone(),
        };
        match asset.kind {
            AssetKind::Video => videos.push(exported),
            AssetKind::Thumbnail => thumbnails.push(exported),
            AssetKind::Subtitle => subtitles.push(exported),
            AssetKind::CopyPack => copy_pack.push(exported),
        }
    }

    let checklist = Destination::ALL
        .iter()
        .map(|&platform| {
            let required = platform.required_ratio();
            let video = videos.iter().find(|v| v.aspect_ratio == Some(required));
            ChecklistEntry {
                platform,
                required_aspect_ratio: required,
                satisfied: video.is_some(),
                filename: video.map(|v| v.filename.clone()),
            }
        })
        .collect();

    let mut variants_exported: Vec<VariantTag> = assets.iter().filter_map(|a| a.variant).collect();
    variants_exported.sort();
    variants_exported.dedup();

    let (compliance_approved, compliance_issues) = match &job.compliance {
        Some(v) => (v.approved, v.issues.clone()),
        None => (false, Vec::new()),
    };

    let mut manifest = ExportManifest {
        job_id: job.id,
        workspace_id: job.workspace_id,
        audit: AuditManifest {
            exported_by: exporter,
            generated_at_ms: 0,
            engine_version: adpack_core::VERSION.to_string(),
            variants_exported,
            asset_counts: AssetCounts {
                videos: videos.len(),
                thumbnails: thumbnails.len(),
                subtitles: subtitles.len(),
                copy_pack: copy_pack.len(),
            },
            job_status: job.status,
            compliance_approved,
            compliance_issues,
            approval_state,
            digest: Hash256([0; 32]),
        },
        videos,
        thumbnails,
        subtitles,
        copy_pack,
        utm_links,
        checklist,
    };

    manifest.audit.digest = hash_serde(&manifest)?;
    manifest.audit.generated_at_ms = generated_at_ms;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        let mut input = JobInput::new(Objective::Sale, "Été: Summer Sale -50%!");
        input.brand_name = Some("Café Crème".into());
        input.site_url = Some("shop.example.com/landing?ref=ads".into());
        // 2024-06-01T12:00:00Z
        Job::new(WorkspaceId::new(), input, 1_717_243_200_000)
    }

    #[test]
    fn slugs_are_ascii() {
        assert_eq!(slug("Café Crème"), "cafe-creme");
        assert_eq!(slug("  Summer   Sale!! "), "summer-sale");
        assert_eq!(slug("Œuvre"), "oeuvre");
        assert_eq!(slug("***"), "untitled");
        assert!(slug(&"a".repeat(80)).len() <= SLUG_MAX);
    }

    #[test]
    fn filename_pattern() {
        let j = job();
        let video = Asset::new(j.id, j.workspace_id, AssetKind::Video, "https://cdn/v.mp4", 2)
            .with_format(AspectRatio::Vertical, VariantTag::default());
        assert_eq!(
            asset_filename(&j, &video),
            "cafe-creme_ete-summer-sale-50_9x16_A_video_20240601.mp4"
        );
        let pack = Asset::new(j.id, j.workspace_id, AssetKind::CopyPack, "store://x", 2);
        assert_eq!(
            asset_filename(&j, &pack),
            "cafe-creme_ete-summer-sale-50_all_copy_pack_20240601.json"
        );
    }

    #[test]
    fn links_keep_existing_query_and_tag_variants() {
        let j = job();
        let b = VariantTag::from_index(1).unwrap();
        let links = tracked_links(&j, &[b]);
        assert_eq!(links.len(), 8);
        assert!(links[0].url.starts_with("https://shop.example.com/landing?ref=ads&utm_source=facebook"));
        assert!(links[0].variant.is_none());
        let tagged: Vec<_> = links.iter().filter(|l| l.variant == Some(b)).collect();
        assert_eq!(tagged.len(), 4);
        assert!(tagged.iter().all(|l| l.url.contains("utm_content=variant_B")));
    }

    #[test]
    fn no_site_url_means_no_links() {
        let mut j = job();
        j.input.site_url = None;
        assert!(tracked_links(&j, &[]).is_empty());
    }

    #[test]
    fn digest_ignores_generation_time() {
        let j = job();
        let assets = vec![
            Asset::new(j.id, j.workspace_id, AssetKind::Video, "https://cdn/a.mp4", 3)
                .with_format(AspectRatio::Square, VariantTag::default()),
            Asset::new(j.id, j.workspace_id, AssetKind::CopyPack, "store://p", 2),
        ];
        let who = UserId::new();
        let a = assemble(&j, assets.clone(), vec![], None, who, 10).unwrap();
        let b = assemble(&j, assets, vec![], None, who, 99).unwrap();
        assert_eq!(a.audit.digest, b.audit.digest);
        assert_ne!(a.audit.generated_at_ms, b.audit.generated_at_ms);

        let sq = a
            .checklist
            .iter()
            .find(|c| c.platform == Destination::InstagramFeed)
            .unwrap();
        assert!(sq.satisfied);
        let tt = a
            .checklist
            .iter()
            .find(|c| c.platform == Destination::Tiktok)
            .unwrap();
        assert!(!tt.satisfied);
    }

    #[test]
    fn duplicate_slots_get_suffixes() {
        let j = job();
        let v = |loc: &str, t: u64| {
            Asset::new(j.id, j.workspace_id, AssetKind::Video, loc, t)
                .with_format(AspectRatio::Square, VariantTag::default())
        };
        let m = assemble(&j, vec![v("a", 1), v("b", 2)], vec![], None, UserId::new(), 0).unwrap();
        assert_eq!(m.videos.len(), 2);
        assert!(m.videos[1].filename.ends_with("_2.mp4"));
        assert_ne!(m.videos[0].filename, m.videos[1].filename);
    }
}
