//! Generation Orchestrator
//!
//! Runs one generation request against the model roster, falling back to the
//! next model whenever an attempt fails. Attempts are strictly sequential and
//! each model is tried at most once per call; the first success ends the call.

use crate::backend::{ErrorKind, GenerationBackend};
use crate::conversation::Turn;
use crate::error::CoreError;
use crate::roster::ModelRoster;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause before moving on after a transient failure.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
/// Upper bound on the pauses summed over one `generate` call, however many models fail.
pub const MAX_TOTAL_BACKOFF: Duration = Duration::from_secs(2);

/// The outcome of a whole `generate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GenerationResult {
    Success {
        text: String,
        model_used: String,
    },
    /// Every model in the roster failed; carries the last error seen.
    Failure {
        last_error_kind: ErrorKind,
        last_error_detail: String,
    },
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success { .. })
    }

    /// Converts `Failure` into `CoreError::AllModelsExhausted`.
    pub fn into_result(self) -> Result<(String, String), CoreError> {
        match self {
            GenerationResult::Success { text, model_used } => Ok((text, model_used)),
            GenerationResult::Failure {
                last_error_kind,
                last_error_detail,
            } => Err(CoreError::AllModelsExhausted {
                kind: last_error_kind,
                detail: last_error_detail,
            }),
        }
    }
}

/// The typed outcome of a single attempt against one model.
#[derive(Debug)]
enum AttemptOutcome {
    Success(String),
    Recoverable(ErrorKind, String),
}

/// Drives generations against a [`GenerationBackend`] with roster fallback.
#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn GenerationBackend>,
    backoff: Duration,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Overrides the delay applied after a transient failure.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Generates a reply to `prompt`, trying each roster model in order.
    pub async fn generate(
        &self,
        prompt: &str,
        history: &[Turn],
        instruction: &str,
        roster: &ModelRoster,
    ) -> GenerationResult {
        let models = roster.models();
        // A roster is never empty, so this is always overwritten.
        let mut last = (
            ErrorKind::TransientError,
            "No model was attempted".to_string(),
        );

        let mut backoff_budget = MAX_TOTAL_BACKOFF;

        for (index, model) in models.iter().enumerate() {
            debug!(%model, attempt = index + 1, of = models.len(), "Attempting generation");

            match self.attempt(model, instruction, history, prompt).await {
                AttemptOutcome::Success(text) => {
                    info!(%model, attempt = index + 1, "Generation succeeded");
                    return GenerationResult::Success {
                        text,
                        model_used: model.clone(),
                    };
                }
                AttemptOutcome::Recoverable(kind, detail) => {
                    warn!(%model, %kind, %detail, "Generation attempt failed");
                    let has_next = index + 1 < models.len();
                    let pause = self.backoff.min(backoff_budget);
                    if kind == ErrorKind::TransientError && has_next && !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                        backoff_budget -= pause;
                    }
                    last = (kind, detail);
                }
            }
        }

        let (last_error_kind, last_error_detail) = last;
        error!(
            models = models.len(),
            kind = %last_error_kind,
            detail = %last_error_detail,
            "All models exhausted"
        );
        GenerationResult::Failure {
            last_error_kind,
            last_error_detail,
        }
    }

    async fn attempt(
        &self,
        model: &str,
        instruction: &str,
        history: &[Turn],
        prompt: &str,
    ) -> AttemptOutcome {
        match self.backend.invoke(model, instruction, history, prompt).await {
            Ok(text) => AttemptOutcome::Success(text),
            Err(e) => AttemptOutcome::Recoverable(e.kind(), e.detail().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockGenerationBackend};
    use mockall::Sequence;
    use tokio::time::Instant;

    fn roster(models: &[&str]) -> ModelRoster {
        ModelRoster::from_override(models.iter().copied())
    }

    fn orchestrator(backend: MockGenerationBackend) -> Orchestrator {
        Orchestrator::new(Arc::new(backend)).with_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_falls_back_in_order_until_success() {
        let mut backend = MockGenerationBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_invoke()
            .withf(|model, _, _, _| model == "A")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(BackendError::QuotaExceeded("429".into())));
        backend
            .expect_invoke()
            .withf(|model, _, _, _| model == "B")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(BackendError::ModelUnavailable("404".into())));
        backend
            .expect_invoke()
            .withf(|model, _, _, _| model == "C")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok("Hei!".into()));

        let result = orchestrator(backend)
            .generate("hei", &[], "instr", &roster(&["A", "B", "C"]))
            .await;

        assert_eq!(
            result,
            GenerationResult::Success {
                text: "Hei!".into(),
                model_used: "C".into()
            }
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_invoke()
            .withf(|model, _, _, _| model == "A")
            .times(1)
            .returning(|_, _, _, _| Ok("first".into()));
        backend
            .expect_invoke()
            .withf(|model, _, _, _| model != "A")
            .times(0);

        let result = orchestrator(backend)
            .generate("p", &[], "i", &roster(&["A", "B", "C"]))
            .await;

        assert_eq!(result.into_result().unwrap(), ("first".to_string(), "A".to_string()));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error_and_tries_each_once() {
        let mut backend = MockGenerationBackend::new();
        let mut seq = Sequence::new();
        for (model, err) in [
            ("A", BackendError::Transient("timeout".into())),
            ("B", BackendError::QuotaExceeded("429".into())),
            ("C", BackendError::ModelUnavailable("gone".into())),
        ] {
            backend
                .expect_invoke()
                .withf(move |m, _, _, _| m == model)
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_, _, _, _| Err(err.clone()));
        }

        let result = orchestrator(backend)
            .generate("p", &[], "i", &roster(&["A", "B", "C"]))
            .await;

        assert_eq!(
            result,
            GenerationResult::Failure {
                last_error_kind: ErrorKind::ModelUnavailable,
                last_error_detail: "gone".into(),
            }
        );
        let err = result.into_result().unwrap_err();
        assert!(matches!(
            err,
            CoreError::AllModelsExhausted {
                kind: ErrorKind::ModelUnavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_passes_instruction_history_and_prompt_through() {
        let history = vec![Turn::teacher("hei"), Turn::pupil("hei!")];
        let expected_history = history.clone();

        let mut backend = MockGenerationBackend::new();
        backend
            .expect_invoke()
            .withf(move |model, instruction, history, prompt| {
                model == "A"
                    && instruction == "persona"
                    && history == expected_history.as_slice()
                    && prompt == "hva er en brøk?"
            })
            .times(1)
            .returning(|_, _, _, _| Ok("vet ikke".into()));

        let result = orchestrator(backend)
            .generate("hva er en brøk?", &history, "persona", &roster(&["A"]))
            .await;
        assert!(result.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_only_after_transient_failure_with_next_candidate() {
        let mut backend = MockGenerationBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_invoke()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(BackendError::Transient("500".into())));
        backend
            .expect_invoke()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(BackendError::QuotaExceeded("429".into())));
        backend
            .expect_invoke()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(BackendError::Transient("500".into())));

        let orchestrator = Orchestrator::new(Arc::new(backend));
        let started = Instant::now();
        let result = orchestrator
            .generate("p", &[], "i", &roster(&["A", "B", "C"]))
            .await;

        assert!(!result.is_success());
        // One pause after A; none after B (quota) or C (last candidate).
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_BACKOFF && elapsed < DEFAULT_BACKOFF * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_backoff_is_capped_across_many_transient_failures() {
        let models: Vec<String> = (0..12).map(|i| format!("model-{}-flash", i)).collect();
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_invoke()
            .times(12)
            .returning(|_, _, _, _| Err(BackendError::Transient("503".into())));

        let orchestrator = Orchestrator::new(Arc::new(backend));
        let started = Instant::now();
        let result = orchestrator
            .generate("p", &[], "i", &ModelRoster::from_override(models))
            .await;

        assert!(!result.is_success());
        let elapsed = started.elapsed();
        assert!(elapsed >= MAX_TOTAL_BACKOFF);
        assert!(elapsed < MAX_TOTAL_BACKOFF + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_backoff_is_clipped_to_total_budget() {
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_invoke()
            .times(2)
            .returning(|_, _, _, _| Err(BackendError::Transient("503".into())));

        let orchestrator =
            Orchestrator::new(Arc::new(backend)).with_backoff(Duration::from_secs(10));
        let started = Instant::now();
        orchestrator
            .generate("p", &[], "i", &roster(&["A", "B"]))
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= MAX_TOTAL_BACKOFF);
        assert!(elapsed < MAX_TOTAL_BACKOFF + Duration::from_millis(100));
    }
}
