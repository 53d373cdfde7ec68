//! Shared stage plumbing: the stage error, deadlines, and JSON extraction.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use adpack_io::GenerationError;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: {source}")]
    Generation {
        stage: &'static str,
        #[source]
        source: GenerationError,
    },

    #[error("{stage}: exceeded {ms} ms deadline")]
    Timeout { stage: &'static str, ms: u64 },

    #[error("{stage}: malformed output: {detail}")]
    Malformed { stage: &'static str, detail: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state: {0}")]
    InvalidState(#[from] adpack_core::Error),
}

impl StageError {
    pub fn malformed(stage: &'static str, detail: impl Into<String>) -> Self {
        StageError::Malformed {
            stage,
            detail: detail.into(),
        }
    }
}

/// Run one external call under the stage deadline.
pub async fn with_deadline<T, F>(
    stage: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, StageError>
where
    F: Future<Output = Result<T, GenerationError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(source)) => Err(StageError::Generation { stage, source }),
        Err(_) => Err(StageError::Timeout {
            stage,
            ms: deadline.as_millis() as u64,
        }),
    }
}

/// Strip Markdown code fences and surrounding prose from a model answer,
/// returning the outermost JSON object or array.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            // drop the optional language tag on the fence line
            let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or(rest);
            rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    };

    let open = body.find(|c: char| c == '{' || c == '[');
    let close = body.rfind(|c: char| c == '}' || c == ']');
    match (open, close) {
        (Some(o), Some(c)) if o < c => &body[o..=c],
        _ => body,
    }
}
