//! Generation backend abstraction.
//!
//! The backend is the only network-facing dependency of the core. Every
//! failure it reports is already classified, so the orchestrator can decide
//! how to fall back without inspecting transport details.

use crate::conversation::Turn;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// The class of a failed generation attempt. All kinds are recoverable by
/// moving on to the next model in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The model's quota or rate limit is used up.
    QuotaExceeded,
    /// The model does not exist or the key may not use it.
    ModelUnavailable,
    /// Anything else: network trouble, server errors, malformed responses.
    TransientError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::QuotaExceeded => write!(f, "quota exceeded"),
            ErrorKind::ModelUnavailable => write!(f, "model unavailable"),
            ErrorKind::TransientError => write!(f, "transient error"),
        }
    }
}

/// A classified failure from a single backend invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Transient error: {0}")]
    Transient(String),
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            BackendError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            BackendError::Transient(_) => ErrorKind::TransientError,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            BackendError::QuotaExceeded(d)
            | BackendError::ModelUnavailable(d)
            | BackendError::Transient(d) => d,
        }
    }
}

/// A language model service that can produce the next pupil (or evaluator) message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Runs one generation against `model`.
    ///
    /// # Arguments
    ///
    /// * `model` - Identifier of the model to use, taken from the roster.
    /// * `system_instruction` - The persona or evaluator instruction.
    /// * `history` - Prior turns, oldest first, not including `prompt`.
    /// * `prompt` - The new message to answer.
    async fn invoke(
        &self,
        model: &str,
        system_instruction: &str,
        history: &[Turn],
        prompt: &str,
    ) -> Result<String, BackendError>;
}
