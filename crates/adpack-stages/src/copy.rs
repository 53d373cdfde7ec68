//! Copy stage: one generation call for the whole copy pack, then the guardrail.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use adpack_core::prelude::*;
use adpack_io::{GenerationPurpose, GenerationRequest, GenerationService};

use crate::guardrail::rewrite_claim;
use crate::traits::{extract_json, with_deadline, StageError};

const STAGE: &str = "copy";

/// Items kept per list.
pub const MAX_ITEMS: usize = 3;

const SYSTEM: &str = "You write short-form video ad copy. Answer with a single JSON object \
with the keys hooks, scripts, ctas, headlines, primary_texts. hooks, ctas, headlines and \
primary_texts are arrays of exactly 3 strings. scripts is an array of objects \
{\"duration_s\": number, \"text\": string}. Hooks must grab attention in under 2 seconds. \
Never promise results, never use superlatives, never invent numbers. Write in the requested \
language only.";

#[derive(Debug, Deserialize)]
struct WireScript {
    #[serde(default, alias = "duration")]
    duration_s: Option<u32>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireCopy {
    #[serde(default)]
    hooks: Vec<String>,
    #[serde(default)]
    scripts: Vec<WireScript>,
    #[serde(default)]
    ctas: Vec<String>,
    #[serde(default)]
    headlines: Vec<String>,
    #[serde(default, alias = "primaryTexts")]
    primary_texts: Vec<String>,
}

pub struct CopyGenerator {
    service: Arc<dyn GenerationService>,
    deadline: Duration,
}

impl CopyGenerator {
    pub fn new(service: Arc<dyn GenerationService>, deadline: Duration) -> Self {
        Self { service, deadline }
    }

    /// Ask for a copy pack. The returned pack has not been through the guardrail.
    pub async fn generate(&self, input: &JobInput) -> Result<CopyPack, StageError> {
        let request = GenerationRequest::json(GenerationPurpose::Copy, SYSTEM, prompt(input));
        let raw = with_deadline(STAGE, self.deadline, self.service.generate(request)).await?;
        parse_copy_pack(&raw, input.duration_s)
    }
}

fn prompt(input: &JobInput) -> String {
    let mut p = format!(
        "Objective: {}\nOffer: {}\nLanguage: {}\nTarget duration: {} seconds\n",
        input.objective.as_str(),
        input.offer.trim(),
        input.language,
        input.duration_s
    );
    let optional = [
        ("Brand", input.brand_name.as_deref()),
        ("Brand voice", input.brand_voice.as_deref()),
        ("Market", input.geo.as_deref()),
        ("Style", input.style.as_deref()),
        ("Website", input.site_url.as_deref()),
    ];
    for (label, value) in optional {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            p.push_str(&format!("{label}: {v}\n"));
        }
    }
    p
}

fn clean(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_ITEMS)
        .collect()
}

/// Parse the service answer. No hooks or no CTAs is a stage failure.
pub fn parse_copy_pack(raw: &str, default_duration_s: u32) -> Result<CopyPack, StageError> {
    let wire: WireCopy = serde_json::from_str(extract_json(raw))
        .map_err(|e| StageError::malformed(STAGE, e.to_string()))?;

    let pack = CopyPack {
        hooks: clean(wire.hooks),
        scripts: wire
            .scripts
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .take(MAX_ITEMS)
            .map(|s| Script {
                duration_s: s.duration_s.unwrap_or(default_duration_s),
                text: s.text.trim().to_string(),
            })
            .collect(),
        ctas: clean(wire.ctas),
        headlines: clean(wire.headlines),
        primary_texts: clean(wire.primary_texts),
    };

    if pack.hooks.is_empty() {
        return Err(StageError::malformed(STAGE, "copy pack has no hooks"));
    }
    if pack.ctas.is_empty() {
        return Err(StageError::malformed(STAGE, "copy pack has no CTAs"));
    }
    Ok(pack)
}

/// Run every hook, headline and CTA through the guardrail.
///
/// Returns the cleaned pack and one decision per matched term.
pub fn guard_copy_pack(pack: &CopyPack, job: &Job, now_ms: u64) -> (CopyPack, Vec<ClaimDecision>) {
    let mut guarded = pack.clone();
    let mut decisions = Vec::new();

    let fields: [(CopyField, &mut Vec<String>); 3] = [
        (CopyField::Hook, &mut guarded.hooks),
        (CopyField::Headline, &mut guarded.headlines),
        (CopyField::Cta, &mut guarded.ctas),
    ];

    for (field, items) in fields {
        for (index, item) in items.iter_mut().enumerate() {
            let result = rewrite_claim(item);
            for finding in &result.findings {
                decisions.push(ClaimDecision {
                    id: ClaimDecisionId::new(),
                    job_id: job.id,
                    workspace_id: job.workspace_id,
                    field,
                    index,
                    term: finding.term.clone(),
                    original_text: item.clone(),
                    decision: finding.outcome,
                    rewritten_text: match finding.outcome {
                        ClaimOutcome::Rewritten => Some(result.text.clone()),
                        ClaimOutcome::Flagged => None,
                    },
                    reason: finding.reason.clone(),
                    created_ms: now_ms,
                });
            }
            if result.modified {
                *item = result.text;
            }
        }
    }

    if !decisions.is_empty() {
        tracing::info!(
            job_id = %job.id,
            decisions = decisions.len(),
            "claim guardrail adjusted copy"
        );
    }
    (guarded, decisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "hooks": ["Le meilleur service garanti", "Stop scrolling", "Summer is here", "extra"],
        "scripts": [{"duration": 15, "text": "Try it today."}],
        "ctas": ["Book now", "Learn more"],
        "headlines": ["Save 20% this summer"],
        "primaryTexts": ["Our summer collection."]
    }"#;

    fn job() -> Job {
        Job::new(
            WorkspaceId::new(),
            JobInput::new(Objective::Sale, "Summer Sale"),
            1,
        )
    }

    #[test]
    fn parses_and_truncates() {
        let pack = parse_copy_pack(GOOD, 15).unwrap();
        assert_eq!(pack.hooks.len(), 3);
        assert_eq!(pack.ctas.len(), 2);
        assert_eq!(pack.scripts[0].duration_s, 15);
        assert_eq!(pack.primary_texts.len(), 1);
    }

    #[test]
    fn fenced_output_is_accepted() {
        let raw = format!("```json\n{GOOD}\n```");
        assert!(parse_copy_pack(&raw, 15).is_ok());
    }

    #[test]
    fn missing_hooks_or_ctas_fail() {
        let no_hooks = r#"{"hooks": [], "ctas": ["Go"]}"#;
        assert!(matches!(
            parse_copy_pack(no_hooks, 15),
            Err(StageError::Malformed { .. })
        ));
        let blank_ctas = r#"{"hooks": ["Hi"], "ctas": ["  "]}"#;
        assert!(parse_copy_pack(blank_ctas, 15).is_err());
        assert!(parse_copy_pack("I cannot help with that", 15).is_err());
    }

    #[test]
    fn guard_records_one_decision_per_term() {
        let pack = parse_copy_pack(GOOD, 15).unwrap();
        let job = job();
        let (guarded, decisions) = guard_copy_pack(&pack, &job, 7);

        assert_eq!(guarded.hooks[0], "Le excellent service conçu pour");
        assert_eq!(guarded.hooks[1], "Stop scrolling");
        // numeric claims stay in place
        assert_eq!(guarded.headlines[0], "Save 20% this summer");

        let rewritten: Vec<_> = decisions
            .iter()
            .filter(|d| d.decision == ClaimOutcome::Rewritten)
            .collect();
        assert_eq!(rewritten.len(), 2);
        assert!(rewritten.iter().all(|d| d.field == CopyField::Hook && d.index == 0));
        assert_eq!(
            rewritten[0].rewritten_text.as_deref(),
            Some("Le excellent service conçu pour")
        );

        let flagged: Vec<_> = decisions
            .iter()
            .filter(|d| d.decision == ClaimOutcome::Flagged)
            .collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].field, CopyField::Headline);
        assert_eq!(flagged[0].term, "20%");
        assert!(decisions.iter().all(|d| d.job_id == job.id && d.created_ms == 7));
    }
}
