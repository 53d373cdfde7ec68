#![forbid(unsafe_code)]
//! adpack: one request in, a compliance-checked multi-format ad pack out.
//!
//! This facade re-exports the workspace crates so integration tests and
//! embedders can depend on a single package.

pub use adpack_core as core;
pub use adpack_exec as exec;
pub use adpack_io as io;
pub use adpack_quota as quota;
pub use adpack_server as server;
pub use adpack_stages as stages;

pub use adpack_exec::{Engine, ExportOptions, InitRequest, InitSummary, RenderRequest, RenderSummary};
