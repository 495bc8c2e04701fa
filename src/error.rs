use thiserror::Error;

/// Typed error kinds for the session/store boundary. `Preempted` and rule
/// engine rejections are intentionally *not* represented here: spec.md
/// treats those as ordinary, expected outcomes reported through normal
/// response frames, not exceptional control flow.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("malformed frame: {0}")]
    Protocol(String),

    #[error("authorization error: {0}")]
    Authorization(String),

    #[error("ai launcher error: {0}")]
    StartAi(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
