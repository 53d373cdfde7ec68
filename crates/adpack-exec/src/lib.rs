#![forbid(unsafe_code)]
//! adpack-exec: the engine that sequences stages against the store and quota.
//!
//! - `pipeline`: `POST /creative/init` semantics (admit, create, copy,
//!   guardrail, blueprints, compliance, escalation).
//! - `render`: per-format render orchestration with polling.
//! - `export`: deterministic deliverable manifest.
//! - `review`: reviewer decisions on Approval Items.
//!
//! Every external call runs inside a quota slot and under the stage deadline.

pub mod error;
pub mod export;
pub mod failpoints;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod review;
pub mod runtime;
mod settle;

pub use error::{PipelineError, Result};
pub use export::{slug, ExportOptions};
pub use pipeline::{InitRequest, InitSummary};
pub use render::{RenderRequest, RenderSummary};
pub use runtime::Engine;
