#![forbid(unsafe_code)]
//! adpack-server: the HTTP face of the creative pipeline.
//!
//! Thin axum layer over [`adpack_exec::Engine`]: it authenticates the bearer
//! token, checks workspace membership, and maps engine errors onto the JSON
//! error envelope. No pipeline logic lives here.

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{build_router, serve, AppState};
