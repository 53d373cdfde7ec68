//! Pipeline configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Whether a compliance-approved job may skip human review before publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    /// Every job gets an Approval Item (publishing is high-risk).
    AlwaysEscalate,
    /// Approved jobs publish without an Approval Item; rejected ones still escalate.
    AutoPublishWhenApproved,
}

impl FromStr for PublishPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "always_escalate" => Ok(PublishPolicy::AlwaysEscalate),
            "auto_publish_when_approved" => Ok(PublishPolicy::AutoPublishWhenApproved),
            other => Err(Error::Config(format!("unknown publish policy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent admitted stages per workspace. Admission fails at or above this.
    pub max_concurrent_per_workspace: usize,

    /// Blueprint variants generated per aspect ratio.
    pub variants_per_format: usize,

    /// Deadline applied to every generation/render call.
    pub stage_timeout_ms: u64,

    /// Fixed render polling interval and attempt ceiling.
    pub render_poll_interval_ms: u64,
    pub render_poll_max_attempts: u32,

    /// Cost units (cents).
    pub generation_call_cost_cents: u64,
    pub render_cost_cents: u64,
    pub thumbnail_cost_cents: u64,

    pub publish_policy: PublishPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_workspace: 3,
            variants_per_format: 2,
            stage_timeout_ms: 90_000,
            render_poll_interval_ms: 5_000,
            render_poll_max_attempts: 60,
            generation_call_cost_cents: 2,
            render_cost_cents: 50,
            thumbnail_cost_cents: 1,
            publish_policy: PublishPolicy::AlwaysEscalate,
        }
    }
}

impl PipelineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ADPACK_MAX_CONCURRENT`: concurrency ceiling per workspace
    /// - `ADPACK_VARIANTS_PER_FORMAT`: variants per aspect ratio
    /// - `ADPACK_STAGE_TIMEOUT_MS`: per-call deadline
    /// - `ADPACK_RENDER_POLL_INTERVAL_MS` / `ADPACK_RENDER_POLL_MAX_ATTEMPTS`
    /// - `ADPACK_GENERATION_COST_CENTS` / `ADPACK_RENDER_COST_CENTS` / `ADPACK_THUMBNAIL_COST_CENTS`
    /// - `ADPACK_PUBLISH_POLICY`: `always_escalate` | `auto_publish_when_approved`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<usize>("ADPACK_MAX_CONCURRENT") {
            cfg.max_concurrent_per_workspace = v;
        }
        if let Some(v) = env_parse::<usize>("ADPACK_VARIANTS_PER_FORMAT") {
            cfg.variants_per_format = v;
        }
        if let Some(v) = env_parse::<u64>("ADPACK_STAGE_TIMEOUT_MS") {
            cfg.stage_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("ADPACK_RENDER_POLL_INTERVAL_MS") {
            cfg.render_poll_interval_ms = v;
        }
        if let Some(v) = env_parse::<u32>("ADPACK_RENDER_POLL_MAX_ATTEMPTS") {
            cfg.render_poll_max_attempts = v;
        }
        if let Some(v) = env_parse::<u64>("ADPACK_GENERATION_COST_CENTS") {
            cfg.generation_call_cost_cents = v;
        }
        if let Some(v) = env_parse::<u64>("ADPACK_RENDER_COST_CENTS") {
            cfg.render_cost_cents = v;
        }
        if let Some(v) = env_parse::<u64>("ADPACK_THUMBNAIL_COST_CENTS") {
            cfg.thumbnail_cost_cents = v;
        }
        if let Some(v) = env_parse::<PublishPolicy>("ADPACK_PUBLISH_POLICY") {
            cfg.publish_policy = v;
        }

        cfg
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_concurrent_per_workspace == 0 {
            return Err(Error::Config(
                "max_concurrent_per_workspace must be at least 1".into(),
            ));
        }
        if self.variants_per_format == 0
            || self.variants_per_format > crate::blueprint::VariantTag::MAX
        {
            return Err(Error::Config(format!(
                "variants_per_format must be within 1..={}",
                crate::blueprint::VariantTag::MAX
            )));
        }
        if self.render_poll_max_attempts == 0 {
            return Err(Error::Config("render_poll_max_attempts must be >= 1".into()));
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    pub fn render_poll_interval(&self) -> Duration {
        Duration::from_millis(self.render_poll_interval_ms)
    }

    /// Blueprints produced by one successful init.
    pub fn blueprints_per_job(&self) -> usize {
        crate::format::AspectRatio::ALL.len() * self.variants_per_format
    }
}

/// Endpoints and credentials of the external collaborators plus the bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub generation_url: Option<String>,
    pub generation_api_key: Option<String>,
    pub generation_model: Option<String>,
    pub render_url: Option<String>,
    pub render_api_key: Option<String>,
    /// JSON file with tokens and memberships for the static workspace directory.
    pub directory_path: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            generation_url: None,
            generation_api_key: None,
            generation_model: None,
            render_url: None,
            render_api_key: None,
            directory_path: None,
        }
    }
}

impl ServiceConfig {
    /// Environment variables: `ADPACK_HOST`, `ADPACK_PORT`, `ADPACK_GENERATION_URL`,
    /// `ADPACK_GENERATION_API_KEY`, `ADPACK_GENERATION_MODEL`, `ADPACK_RENDER_URL`,
    /// `ADPACK_RENDER_API_KEY`, `ADPACK_DIRECTORY_PATH`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("ADPACK_HOST") {
            cfg.host = s;
        }
        if let Some(v) = env_parse::<u16>("ADPACK_PORT") {
            cfg.port = v;
        }
        cfg.generation_url = std::env::var("ADPACK_GENERATION_URL").ok();
        cfg.generation_api_key = std::env::var("ADPACK_GENERATION_API_KEY").ok();
        cfg.generation_model = std::env::var("ADPACK_GENERATION_MODEL").ok();
        cfg.render_url = std::env::var("ADPACK_RENDER_URL").ok();
        cfg.render_api_key = std::env::var("ADPACK_RENDER_API_KEY").ok();
        cfg.directory_path = std::env::var("ADPACK_DIRECTORY_PATH").ok();

        cfg
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
