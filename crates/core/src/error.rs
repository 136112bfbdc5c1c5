//! Error types shared by the core components.

use crate::backend::ErrorKind;
use crate::conversation::Role;

/// Errors surfaced by the core to its caller.
///
/// Per-attempt backend failures never appear here on their own; the
/// orchestrator folds them into a single `AllModelsExhausted`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Grade {0} is outside the supported range 1..=10")]
    InvalidGrade(i64),
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Topic is empty")]
    EmptyTopic,
    #[error("A {attempted} turn cannot follow {previous}")]
    OutOfTurn {
        attempted: Role,
        previous: String,
    },
    #[error("All models exhausted, last error ({kind}): {detail}")]
    AllModelsExhausted { kind: ErrorKind, detail: String },
    #[error("Invalid curriculum table: {0}")]
    Curriculum(String),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
