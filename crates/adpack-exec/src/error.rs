use thiserror::Error;

use adpack_io::StoreError;
use adpack_stages::StageError;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors a caller of the engine can receive. Stage failures inside the init
/// pipeline do not surface here; they settle the job as `failed` instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("quota exceeded: {in_flight} of {ceiling} concurrent stages in use")]
    QuotaExceeded { in_flight: usize, ceiling: usize },

    #[error("quota backend unavailable: {0}")]
    QuotaUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("stage error: {0}")]
    Stage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => PipelineError::NotFound { entity, id },
            StoreError::AccessDenied { .. } => PipelineError::Forbidden(e.to_string()),
            StoreError::Conflict(msg) => PipelineError::Conflict(msg),
            StoreError::DuplicateIdempotencyKey { .. } => PipelineError::Conflict(e.to_string()),
            StoreError::Backend(msg) => PipelineError::Store(msg),
        }
    }
}

impl From<StageError> for PipelineError {
    fn from(e: StageError) -> Self {
        match e {
            StageError::Conflict(msg) => PipelineError::Conflict(msg),
            StageError::InvalidState(inner) => PipelineError::InvalidState(inner.to_string()),
            other => PipelineError::Stage(other.to_string()),
        }
    }
}

impl From<adpack_core::Error> for PipelineError {
    fn from(e: adpack_core::Error) -> Self {
        match e {
            adpack_core::Error::Transition { .. } => PipelineError::InvalidState(e.to_string()),
            adpack_core::Error::Parse(msg) => PipelineError::InvalidInput(msg),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}
