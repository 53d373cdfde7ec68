#![forbid(unsafe_code)]
//! adpack-io: adapters for the collaborators the pipeline consumes.
//!
//! - `store`: row store trait (workspace-scoped) + `MemoryStore`.
//! - `generation`: AI text-generation service trait + HTTP client.
//! - `render`: video render service trait + HTTP client.
//! - `directory`: bearer-token and workspace-membership lookups.
//!
//! The store also owns the quota counters (`adpack_quota::CounterStore`), so
//! admission state lives next to the rows it guards.

pub mod directory;
pub mod endpoint;
pub mod error;
pub mod generation;
pub mod memory_store;
pub mod render;
pub mod store;

pub use directory::{DirectoryEntry, StaticDirectory, WorkspaceDirectory};
pub use error::{GenerationError, RenderError, StoreError};
pub use generation::{
    GenerationPurpose, GenerationRequest, GenerationService, HttpGenerationClient, ResponseFormat,
};
pub use memory_store::MemoryStore;
pub use render::{
    HttpRenderClient, RenderElement, RenderElementKind, RenderPoll, RenderService, RenderStatus,
    SceneDescription,
};
pub use store::{CreativeStore, StoreResult};
