use adpack_core::id::JobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("access to {entity} {id} denied for this workspace")]
    AccessDenied { entity: &'static str, id: String },

    #[error("idempotency key already used by job {existing}")]
    DuplicateIdempotencyKey { existing: JobId },

    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Everything that can go wrong talking to the generation service.
///
/// Callers never look inside to decide approval; any variant is a failure.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service unreachable: {0}")]
    Transport(String),

    #[error("generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation call exceeded {0} ms deadline")]
    Timeout(u64),

    #[error("generation response malformed: {0}")]
    Malformed(String),

    #[error("generation service not configured")]
    NotConfigured,

    #[error("generation service url invalid: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Transport(format!("timed out: {e}"))
        } else if e.is_decode() {
            GenerationError::Malformed(e.to_string())
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render service unreachable: {0}")]
    Transport(String),

    #[error("render service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("render call exceeded {0} ms deadline")]
    Timeout(u64),

    #[error("render response malformed: {0}")]
    Malformed(String),

    #[error("render service not configured")]
    NotConfigured,

    #[error("render service url invalid: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for RenderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RenderError::Malformed(e.to_string())
        } else {
            RenderError::Transport(e.to_string())
        }
    }
}
