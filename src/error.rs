use crate::store::StoreError;

/// Caller-facing error taxonomy for every engine operation.
///
/// All variants are terminal: the engine never retries internally, and the
/// request layer surfaces them verbatim with the mapped status code.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed or oversized input. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Bearer token did not resolve to an agent identity.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated but not authorized for this entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing project, task, comment, or agent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate name (projects are unique case-insensitively).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Oversized text payload (comment body).
    #[error("payload too large (max {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    /// Tier quota reached. Carries current/limit for client-side backoff.
    #[error("{resource} limit reached ({current}/{limit})")]
    LimitExceeded {
        resource: &'static str,
        current: u64,
        limit: u64,
    },

    /// Underlying key-value store fault.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// HTTP-equivalent status code for the request layer.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Validation(_) => 400,
            EngineError::Unauthenticated => 401,
            EngineError::Forbidden(_) => 403,
            EngineError::NotFound(_) => 404,
            EngineError::Conflict(_) => 409,
            EngineError::PayloadTooLarge { .. } => 413,
            EngineError::LimitExceeded { .. } => 429,
            EngineError::Store(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
