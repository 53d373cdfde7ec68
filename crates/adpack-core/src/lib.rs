#![forbid(unsafe_code)]
//! adpack-core: shared vocabulary for the creative production pipeline.
//!
//! Everything here is plain data plus a few pure helpers: identifiers, the
//! job/blueprint/asset/approval models, aspect ratios and their safe zones,
//! configuration, stable hashing, and the quota interfaces that
//! `adpack-quota` implements. No async, no IO.

pub mod approval;
pub mod asset;
pub mod blueprint;
pub mod config;
pub mod copy;
pub mod error;
pub mod experiment;
pub mod format;
pub mod hash;
pub mod id;
pub mod job;
pub mod manifest;
pub mod prelude;
pub mod quota;

pub use error::{Error, Result};

/// Version string stamped into export manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Milliseconds since Unix epoch (UTC).
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
