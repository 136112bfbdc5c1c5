//! Conversation State Store
//!
//! An append-only, strictly alternating sequence of teacher and pupil turns.
//! Both the pupil simulation (as prior history) and the evaluator (as a
//! transcript) read from it.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The teacher trainee using the simulator.
    Teacher,
    /// The simulated pupil.
    Pupil,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Teacher => write!(f, "teacher"),
            Role::Pupil => write!(f, "pupil"),
        }
    }
}

/// A single immutable message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn teacher(content: impl Into<String>) -> Self {
        Self {
            role: Role::Teacher,
            content: content.into(),
        }
    }

    pub fn pupil(content: impl Into<String>) -> Self {
        Self {
            role: Role::Pupil,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// The turns of the active session, in conversation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn to the end of the conversation.
    ///
    /// The first turn must come from the teacher and roles must alternate
    /// afterwards; anything else is rejected and the state is left untouched.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        let expected = match self.turns.last() {
            None | Some(Turn { role: Role::Pupil, .. }) => Role::Teacher,
            Some(Turn { role: Role::Teacher, .. }) => Role::Pupil,
        };
        if turn.role != expected {
            return Err(CoreError::OutOfTurn {
                attempted: turn.role,
                previous: self
                    .turns
                    .last()
                    .map(|t| t.role.to_string())
                    .unwrap_or_else(|| "an empty conversation".to_string()),
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Clears every turn.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Every turn except the most recent one, which is the active prompt.
    pub fn snapshot_history_excluding_last(&self) -> Vec<Turn> {
        match self.turns.split_last() {
            Some((_, rest)) => rest.to_vec(),
            None => Vec::new(),
        }
    }

    /// Flat, role-prefixed rendering used as evaluator input.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
