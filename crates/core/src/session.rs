//! Session Aggregate
//!
//! A `Session` owns everything one practice conversation needs: the
//! configuration, the conversation state, the cached model roster and the
//! random source for pupil identities. The presentation shell holds the
//! session and drives it through explicit method calls or [`Command`]s.

use crate::Command;
use crate::conversation::{ConversationState, Turn};
use crate::curriculum::{CurriculumTable, KnowledgeProfile};
use crate::error::{CoreError, Result};
use crate::evaluator;
use crate::identity::{pick_identity_with, pick_new_identity_with};
use crate::orchestrator::{GenerationResult, Orchestrator};
use crate::persona;
use crate::prompts::PromptTemplates;
use crate::roster::{CapabilitySource, ModelRoster};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DEFAULT_GRADE: u8 = 5;
pub const DEFAULT_TOPIC: &str = "Brøk";

/// Recorded as the pupil's turn when every model failed.
pub const PUPIL_APOLOGY: &str =
    "Beklager, jeg klarer ikke å svare akkurat nå. Kan du prøve å si det én gang til?";
/// Shown instead of a critique when the evaluator could not run.
pub const EVALUATOR_APOLOGY: &str =
    "Beklager, veilederen er ikke tilgjengelig akkurat nå. Prøv igjen om litt.";
/// Shown when evaluation is requested before anything has been said.
pub const NOTHING_TO_EVALUATE: &str = "Det er ingen samtale å vurdere ennå.";

/// A school grade in the supported range 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Grade(u8);

impl Grade {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CoreError::InvalidGrade(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The parameters that shape the pupil. Changing any of them starts a new conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    pub grade: Grade,
    pub topic: String,
    pub pupil_identity: String,
    /// `true` when the identity was chosen by the user rather than generated.
    pub identity_is_override: bool,
}

/// Options recognised when starting a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub grade: u8,
    pub topic: String,
    /// Generated from the session seed when absent.
    pub pupil_identity: Option<String>,
    /// Bypasses automatic roster discovery and priority when non-empty.
    pub model_preference_override: Option<Vec<String>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            grade: DEFAULT_GRADE,
            topic: DEFAULT_TOPIC.to_string(),
            pupil_identity: None,
            model_preference_override: None,
        }
    }
}

/// The collaborators a session calls into.
#[derive(Clone)]
pub struct SessionServices {
    pub orchestrator: Orchestrator,
    pub capabilities: Arc<dyn CapabilitySource>,
    pub templates: PromptTemplates,
    pub curriculum: CurriculumTable,
}

/// What one teacher message produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    /// The text recorded as the pupil's turn; the apology when generation failed.
    pub reply: String,
    pub result: GenerationResult,
}

/// A pedagogical critique ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub text: String,
    /// `None` when no model produced the text.
    pub model_used: Option<String>,
}

/// The result of handling one [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommandOutcome {
    Reply(TurnReport),
    Evaluation(Evaluation),
    Reset,
    RosterRefreshed(ModelRoster),
    /// `changed` is false when the new value equalled the old one.
    ConfigUpdated { changed: bool },
}

/// One teacher-training conversation and everything it owns.
pub struct Session {
    config: SessionConfig,
    conversation: ConversationState,
    roster: ModelRoster,
    model_preference_override: Option<Vec<String>>,
    rng: StdRng,
    services: SessionServices,
}

impl Session {
    /// Creates a session and discovers its model roster.
    ///
    /// `seed` drives identity generation, so a fixed seed gives a
    /// reproducible sequence of pupil names.
    pub async fn start(
        options: SessionOptions,
        services: SessionServices,
        seed: u64,
    ) -> Result<Self> {
        let grade = Grade::new(i64::from(options.grade))?;
        let topic = normalize_topic(&options.topic)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let (pupil_identity, identity_is_override) = match options
            .pupil_identity
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            Some(name) => (name.to_string(), true),
            None => (pick_identity_with(&mut rng), false),
        };

        let roster = ModelRoster::discover(
            services.capabilities.as_ref(),
            options.model_preference_override.as_deref(),
        )
        .await;

        info!(%grade, %topic, pupil = %pupil_identity, models = roster.len(), "Session started");

        Ok(Self {
            config: SessionConfig {
                grade,
                topic,
                pupil_identity,
                identity_is_override,
            },
            conversation: ConversationState::new(),
            roster,
            model_preference_override: options.model_preference_override,
            rng,
            services,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn roster(&self) -> &ModelRoster {
        &self.roster
    }

    pub fn knowledge_profile(&self) -> KnowledgeProfile {
        self.services
            .curriculum
            .resolve(i64::from(self.config.grade.get()))
    }

    /// The persona instruction for the current configuration.
    pub fn instruction(&self) -> String {
        persona::compile(
            &self.services.templates,
            &self.config.pupil_identity,
            self.config.grade.get(),
            &self.config.topic,
            &self.knowledge_profile(),
        )
    }

    /// Records a teacher message and the pupil's reply.
    ///
    /// The pupil turn is always appended: on exhausted failure it holds
    /// [`PUPIL_APOLOGY`], so the transcript stays contiguous.
    #[instrument(skip_all, fields(turn = self.conversation.len()))]
    pub async fn send_teacher_message(&mut self, text: &str) -> Result<TurnReport> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::EmptyMessage);
        }

        self.conversation.append(Turn::teacher(text))?;
        let history = self.conversation.snapshot_history_excluding_last();
        let instruction = self.instruction();

        let result = self
            .services
            .orchestrator
            .generate(text, &history, &instruction, &self.roster)
            .await;

        let reply = match &result {
            GenerationResult::Success { text, .. } => text.clone(),
            GenerationResult::Failure { .. } => PUPIL_APOLOGY.to_string(),
        };
        self.conversation.append(Turn::pupil(reply.clone()))?;

        Ok(TurnReport { reply, result })
    }

    /// Asks the evaluator for a critique of the conversation so far.
    #[instrument(skip_all, fields(turns = self.conversation.len()))]
    pub async fn evaluate(&self) -> Evaluation {
        if self.conversation.is_empty() {
            return Evaluation {
                text: NOTHING_TO_EVALUATE.to_string(),
                model_used: None,
            };
        }

        let result = evaluator::evaluate(
            &self.services.orchestrator,
            &self.roster,
            &self.services.templates,
            &self.conversation,
            &self.config,
        )
        .await;

        match result {
            GenerationResult::Success { text, model_used } => Evaluation {
                text,
                model_used: Some(model_used),
            },
            GenerationResult::Failure { last_error_kind, .. } => {
                warn!(kind = %last_error_kind, "Evaluation failed");
                Evaluation {
                    text: EVALUATOR_APOLOGY.to_string(),
                    model_used: None,
                }
            }
        }
    }

    /// Clears the conversation.
    pub fn reset(&mut self) {
        self.conversation.reset();
        info!("Conversation reset");
    }

    /// Queries the capability source again and replaces the cached roster.
    pub async fn refresh_roster(&mut self) -> &ModelRoster {
        self.roster = ModelRoster::discover(
            self.services.capabilities.as_ref(),
            self.model_preference_override.as_deref(),
        )
        .await;
        &self.roster
    }

    /// Changes the grade. Resets the conversation when the grade differs.
    pub fn set_grade(&mut self, grade: u8) -> Result<bool> {
        let grade = Grade::new(i64::from(grade))?;
        if grade == self.config.grade {
            return Ok(false);
        }
        self.config.grade = grade;
        self.config_changed();
        Ok(true)
    }

    /// Changes the topic. Resets the conversation when the topic differs.
    pub fn set_topic(&mut self, topic: &str) -> Result<bool> {
        let topic = normalize_topic(topic)?;
        if topic == self.config.topic {
            return Ok(false);
        }
        self.config.topic = topic;
        self.config_changed();
        Ok(true)
    }

    /// Sets the pupil's name and keeps it across later grade or topic changes.
    ///
    /// An empty name drops the override and generates a new identity.
    pub fn set_identity(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            if !self.config.identity_is_override {
                return Ok(false);
            }
            self.config.identity_is_override = false;
            self.config_changed();
            return Ok(true);
        }
        if self.config.identity_is_override && name == self.config.pupil_identity {
            return Ok(false);
        }
        self.config.pupil_identity = name.to_string();
        self.config.identity_is_override = true;
        self.config_changed();
        Ok(true)
    }

    /// Consumes one command from the shell.
    pub async fn handle(&mut self, command: Command) -> Result<CommandOutcome> {
        match command {
            Command::TeacherMessage(text) => {
                Ok(CommandOutcome::Reply(self.send_teacher_message(&text).await?))
            }
            Command::RequestEvaluation => Ok(CommandOutcome::Evaluation(self.evaluate().await)),
            Command::Reset => {
                self.reset();
                Ok(CommandOutcome::Reset)
            }
            Command::RefreshRoster => Ok(CommandOutcome::RosterRefreshed(
                self.refresh_roster().await.clone(),
            )),
            Command::SetGrade(grade) => Ok(CommandOutcome::ConfigUpdated {
                changed: self.set_grade(grade)?,
            }),
            Command::SetTopic(topic) => Ok(CommandOutcome::ConfigUpdated {
                changed: self.set_topic(&topic)?,
            }),
            Command::SetIdentity(name) => Ok(CommandOutcome::ConfigUpdated {
                changed: self.set_identity(&name)?,
            }),
        }
    }

    fn config_changed(&mut self) {
        if !self.config.identity_is_override {
            self.config.pupil_identity =
                pick_new_identity_with(&mut self.rng, &self.config.pupil_identity);
        }
        self.conversation.reset();
        info!(
            grade = %self.config.grade,
            topic = %self.config.topic,
            pupil = %self.config.pupil_identity,
            "Session configuration changed, conversation reset"
        );
    }
}

fn normalize_topic(topic: &str) -> Result<String> {
    let topic = topic.trim();
    if topic.is_empty() {
        Err(CoreError::EmptyTopic)
    } else {
        Ok(topic.to_string())
    }
}
