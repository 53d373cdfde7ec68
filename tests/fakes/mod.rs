//! Scripted generation and render services shared by the scenario tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use adpack::core::config::PipelineConfig;
use adpack::core::prelude::*;
use adpack::io::{
    GenerationError, GenerationPurpose, GenerationRequest, GenerationService, RenderError,
    RenderPoll, RenderService, RenderStatus, SceneDescription,
};
use adpack::Engine;

/// How the fake answers one kind of call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    /// Never answers; the stage deadline has to fire.
    Hang,
}

pub fn copy_pack_json(hooks: &[&str]) -> String {
    json!({
        "hooks": hooks,
        "scripts": [{"duration_s": 15, "text": "Everything must go this summer."}],
        "ctas": ["Shop now", "See the deals"],
        "headlines": ["Summer Sale", "Up to half off"],
        "primary_texts": ["Our summer collection is here."]
    })
    .to_string()
}

pub fn blueprint_json(inside_safe_zone: bool) -> String {
    json!({
        "duration_s": 15,
        "scenes": [
            {"start_s": 0, "end_s": 3,
             "text_overlay": {"text": "Summer Sale", "position": "top", "inside_safe_zone": inside_safe_zone}},
            {"start_s": 3, "end_s": 15, "asset": {"kind": "product"}}
        ],
        "subtitles": [{"start_s": 0, "end_s": 3, "text": "Summer Sale"}],
        "cta": {"text": "Shop now", "position": "bottom", "start_s": 12, "end_s": 15}
    })
    .to_string()
}

pub struct FakeGeneration {
    copy: Reply,
    blueprint: Reply,
    compliance: Reply,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGeneration {
    /// Clean copy, valid blueprints, approving verdict.
    pub fn approving() -> Self {
        Self {
            copy: Reply::Text(copy_pack_json(&["Stop scrolling", "Summer is here"])),
            blueprint: Reply::Text(blueprint_json(true)),
            compliance: Reply::Text(r#"{"approved": true, "issues": []}"#.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_copy(mut self, reply: Reply) -> Self {
        self.copy = reply;
        self
    }

    pub fn with_blueprint(mut self, reply: Reply) -> Self {
        self.blueprint = reply;
        self
    }

    pub fn with_compliance(mut self, reply: Reply) -> Self {
        self.compliance = reply;
        self
    }

    pub fn calls(&self) -> Vec<GenerationPurpose> {
        self.requests.lock().unwrap().iter().map(|r| r.purpose).collect()
    }

    /// Prompt of the blueprint request for one format and variant.
    pub fn blueprint_prompt(&self, ratio: AspectRatio, variant: VariantTag) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.purpose
                    == GenerationPurpose::Blueprint {
                        aspect_ratio: ratio,
                        variant,
                    }
            })
            .map(|r| r.prompt.clone())
    }

    pub fn count(&self, kind: &str) -> usize {
        self.calls().iter().filter(|p| p.as_str() == kind).count()
    }
}

#[async_trait]
impl GenerationService for FakeGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let purpose = request.purpose;
        self.requests.lock().unwrap().push(request);
        let reply = match purpose {
            GenerationPurpose::Copy => &self.copy,
            GenerationPurpose::Blueprint { .. } => &self.blueprint,
            GenerationPurpose::Compliance => &self.compliance,
        };
        match reply {
            Reply::Text(s) => Ok(s.clone()),
            Reply::Fail(msg) => Err(GenerationError::Transport(msg.clone())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GenerationError::Transport("hang ended".into()))
            }
        }
    }
}

/// Per-format render script.
#[derive(Debug, Clone)]
pub enum RenderScript {
    /// Processing once, then done.
    Succeed { thumbnail: bool },
    /// Processing once, then failed with the message.
    Fail(String),
    SubmitError,
    /// First submit of the format errors, later ones succeed.
    FailFirstSubmit,
    /// Never leaves `processing`.
    Stuck,
}

pub struct FakeRender {
    scripts: HashMap<AspectRatio, RenderScript>,
    renders: Mutex<HashMap<String, (AspectRatio, usize)>>,
    submitted: Mutex<Vec<SceneDescription>>,
    seq: AtomicUsize,
}

impl FakeRender {
    pub fn all_succeed() -> Self {
        Self::scripted(
            AspectRatio::ALL
                .iter()
                .map(|r| (*r, RenderScript::Succeed { thumbnail: false })),
        )
    }

    pub fn scripted(scripts: impl IntoIterator<Item = (AspectRatio, RenderScript)>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
            renders: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            seq: AtomicUsize::new(0),
        }
    }

    pub fn submitted(&self) -> Vec<SceneDescription> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_for(&self, ratio: AspectRatio) -> usize {
        self.submitted()
            .iter()
            .filter(|s| Self::ratio_of(s) == Some(ratio))
            .count()
    }

    fn ratio_of(scene: &SceneDescription) -> Option<AspectRatio> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.dimensions() == (scene.width, scene.height))
    }

    fn script(&self, ratio: AspectRatio) -> RenderScript {
        self.scripts
            .get(&ratio)
            .cloned()
            .unwrap_or(RenderScript::Succeed { thumbnail: false })
    }
}

#[async_trait]
impl RenderService for FakeRender {
    async fn submit(&self, scene: &SceneDescription) -> Result<String, RenderError> {
        self.submitted.lock().unwrap().push(scene.clone());
        let ratio = Self::ratio_of(scene)
            .ok_or_else(|| RenderError::Malformed(format!("{}x{}", scene.width, scene.height)))?;
        let failing = match self.script(ratio) {
            RenderScript::SubmitError => true,
            RenderScript::FailFirstSubmit => self.submitted_for(ratio) == 1,
            _ => false,
        };
        if failing {
            return Err(RenderError::Status {
                status: 500,
                body: "renderer down".into(),
            });
        }
        let id = format!(
            "render-{}-{}",
            ratio.file_token(),
            self.seq.fetch_add(1, Ordering::SeqCst)
        );
        self.renders.lock().unwrap().insert(id.clone(), (ratio, 0));
        Ok(id)
    }

    async fn poll(&self, render_id: &str) -> Result<RenderPoll, RenderError> {
        let (ratio, polls) = {
            let mut renders = self.renders.lock().unwrap();
            let entry = renders
                .get_mut(render_id)
                .ok_or_else(|| RenderError::Malformed(format!("unknown render {render_id}")))?;
            entry.1 += 1;
            *entry
        };
        let processing = RenderPoll {
            status: RenderStatus::Processing,
            url: None,
            thumbnail_url: None,
            error: None,
        };
        if polls < 2 {
            return Ok(processing);
        }
        Ok(match self.script(ratio) {
            RenderScript::FailFirstSubmit => RenderPoll {
                status: RenderStatus::Done,
                url: Some(format!("https://cdn.test/{render_id}.mp4")),
                thumbnail_url: None,
                error: None,
            },
            RenderScript::Succeed { thumbnail } => RenderPoll {
                status: RenderStatus::Done,
                url: Some(format!("https://cdn.test/{render_id}.mp4")),
                thumbnail_url: thumbnail.then(|| format!("https://cdn.test/{render_id}.jpg")),
                error: None,
            },
            RenderScript::Fail(msg) => RenderPoll {
                status: RenderStatus::Failed,
                url: None,
                thumbnail_url: None,
                error: Some(msg),
            },
            RenderScript::Stuck | RenderScript::SubmitError => processing,
        })
    }
}

/// Defaults with fast polling so render tests stay quick.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        stage_timeout_ms: 2_000,
        render_poll_interval_ms: 1,
        render_poll_max_attempts: 5,
        ..PipelineConfig::default()
    }
}

pub fn engine(
    cfg: PipelineConfig,
    generation: &Arc<FakeGeneration>,
    render: &Arc<FakeRender>,
) -> Engine {
    let generation: Arc<dyn GenerationService> = generation.clone();
    let render: Arc<dyn RenderService> = render.clone();
    Engine::in_memory(cfg, generation, render).unwrap()
}

pub fn summer_sale() -> JobInput {
    let mut input = JobInput::new(Objective::Sale, "Summer Sale");
    input.duration_s = 15;
    input.brand_name = Some("Acme".into());
    input.site_url = Some("https://shop.acme.test/summer".into());
    input
}
