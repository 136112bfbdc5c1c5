//! Evaluator Trigger
//!
//! A one-shot critique of the full conversation, run through the same
//! orchestrator as the pupil but with a fixed evaluator persona.

use crate::conversation::ConversationState;
use crate::identity::age_for_grade;
use crate::orchestrator::{GenerationResult, Orchestrator};
use crate::prompts::{PromptTemplates, expand};
use crate::roster::ModelRoster;
use crate::session::SessionConfig;

/// Compiles the evaluator instruction for a session.
pub fn compile_instruction(templates: &PromptTemplates, config: &SessionConfig) -> String {
    let grade = config.grade.get();
    let age = age_for_grade(grade).to_string();
    let grade = grade.to_string();

    expand(
        &templates.evaluator,
        &[
            ("name", config.pupil_identity.as_str()),
            ("age", age.as_str()),
            ("grade", grade.as_str()),
            ("topic", config.topic.as_str()),
        ],
    )
}

/// Requests a pedagogical critique of `conversation`.
///
/// The transcript is the prompt and no prior history is sent. The
/// conversation is only read.
pub async fn evaluate(
    orchestrator: &Orchestrator,
    roster: &ModelRoster,
    templates: &PromptTemplates,
    conversation: &ConversationState,
    config: &SessionConfig,
) -> GenerationResult {
    let instruction = compile_instruction(templates, config);
    orchestrator
        .generate(&conversation.transcript(), &[], &instruction, roster)
        .await
}
