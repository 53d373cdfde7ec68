use adpack_core::id::WorkspaceId;
use thiserror::Error;

/// Result type local to adpack-quota.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("quota exceeded for workspace {workspace}: {in_flight} of {ceiling} slots in use")]
    Exceeded {
        workspace: WorkspaceId,
        in_flight: usize,
        ceiling: usize,
    },

    #[error("quota counter for workspace {0} is already zero")]
    Underflow(WorkspaceId),

    #[error("quota counter backend error: {0}")]
    Backend(String),
}
