pub mod backend;
pub mod conversation;
pub mod curriculum;
pub mod error;
pub mod evaluator;
pub mod gemini;
pub mod identity;
pub mod orchestrator;
pub mod persona;
pub mod prompts;
pub mod roster;
pub mod session;

pub use error::CoreError;

/// Represents the discrete actions a presentation shell can ask of a session.
///
/// Each command is consumed exactly once by [`session::Session::handle`].
/// Requesting an evaluation is a command like any other, not a flag that
/// lingers in shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The teacher trainee said something; the pupil should answer.
    TeacherMessage(String),
    /// Produce a pedagogical critique of the conversation so far.
    RequestEvaluation,
    /// Start the conversation over with the same configuration.
    Reset,
    /// Query the capability source again and rebuild the model roster.
    RefreshRoster,
    /// Change the pupil's grade (1..=10).
    SetGrade(u8),
    /// Change the topic being taught.
    SetTopic(String),
    /// Fix the pupil's name; an empty name returns to generated names.
    SetIdentity(String),
}
