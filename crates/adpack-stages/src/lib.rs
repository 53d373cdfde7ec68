#![forbid(unsafe_code)]
//! adpack-stages: the generation pipeline stages.
//!
//! - `guardrail`: offline claim rewriting/flagging (pure, synchronous).
//! - `copy`: copy pack generation + guardrail pass.
//! - `blueprint`: per-ratio, per-variant scene descriptions.
//! - `compliance`: fail-closed QCO gate.
//! - `approval`: escalation and reviewer decisions.
//!
//! Stages never touch the store or the quota; `adpack-exec` sequences them
//! and persists their output.

pub mod approval;
pub mod blueprint;
pub mod compliance;
pub mod copy;
pub mod guardrail;
pub mod traits;

pub use approval::{ApprovalDesk, ApprovalEscalator, DecisionEffect};
pub use blueprint::BlueprintGenerator;
pub use compliance::{structural_issues, ComplianceValidator};
pub use copy::{guard_copy_pack, CopyGenerator};
pub use guardrail::{rewrite_claim, ClaimFinding, ClaimRewrite};
pub use traits::{extract_json, with_deadline, StageError};
