//! Terminal chat loop.
//!
//! Plain lines are teacher messages; lines starting with `/` are commands.
//! All state lives in the `Session`; this module only parses and renders.

use anyhow::Result;
use pupil_core::{
    Command,
    orchestrator::GenerationResult,
    session::{CommandOutcome, Session},
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

pub const HELP: &str = "\
Skriv en melding for å snakke med eleven. Kommandoer:
  /veileder, /evaluate   få tilbakemelding på samtalen
  /reset                 nullstill samtalen
  /grade <1-10>          bytt klassetrinn (nullstiller)
  /topic <tema>          bytt tema (nullstiller)
  /name [navn]           velg elevens navn, tomt gir tilfeldig navn
  /profile               vis elevens kunnskapsprofil
  /models                vis modellrekkefølgen
  /refresh               hent modellisten på nytt
  /help                  vis denne hjelpen
  /quit                  avslutt";

/// What one input line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Session(Command),
    ShowModels,
    ShowProfile,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown command '/{0}'. Type /help for a list of commands.")]
    UnknownCommand(String),
    #[error("/grade needs a number between 1 and 10, got '{0}'")]
    InvalidGrade(String),
    #[error("/topic needs a topic")]
    MissingTopic,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Action>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Action::Session(Command::TeacherMessage(
            line.to_string(),
        ))));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let action = match name.to_lowercase().as_str() {
        "veileder" | "evaluate" => Action::Session(Command::RequestEvaluation),
        "reset" => Action::Session(Command::Reset),
        "refresh" => Action::Session(Command::RefreshRoster),
        "grade" | "trinn" => {
            let grade = arg
                .parse::<u8>()
                .map_err(|_| ParseError::InvalidGrade(arg.to_string()))?;
            Action::Session(Command::SetGrade(grade))
        }
        "topic" | "tema" => {
            if arg.is_empty() {
                return Err(ParseError::MissingTopic);
            }
            Action::Session(Command::SetTopic(arg.to_string()))
        }
        "name" | "navn" => Action::Session(Command::SetIdentity(arg.to_string())),
        "models" => Action::ShowModels,
        "profile" => Action::ShowProfile,
        "help" => Action::Help,
        "quit" | "exit" => Action::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(action))
}

/// Renders a command outcome for the terminal.
pub fn render_outcome(outcome: &CommandOutcome, session: &Session) -> String {
    match outcome {
        CommandOutcome::Reply(report) => {
            let name = &session.config().pupil_identity;
            match &report.result {
                GenerationResult::Success { model_used, .. } => {
                    format!("{} ({}): {}", name, model_used, report.reply)
                }
                GenerationResult::Failure {
                    last_error_kind, ..
                } => format!(
                    "{}: {}\n[alle modeller feilet: {}]",
                    name, report.reply, last_error_kind
                ),
            }
        }
        CommandOutcome::Evaluation(evaluation) => match &evaluation.model_used {
            Some(model) => format!("--- Veileder ({}) ---\n{}", model, evaluation.text),
            None => format!("--- Veileder ---\n{}", evaluation.text),
        },
        CommandOutcome::Reset => "Samtalen er nullstilt.".to_string(),
        CommandOutcome::RosterRefreshed(roster) => {
            format!("Modeller: {}", roster.models().join(", "))
        }
        CommandOutcome::ConfigUpdated { changed: false } => "Ingen endring.".to_string(),
        CommandOutcome::ConfigUpdated { changed: true } => {
            format!("Ny samtale. {}", describe_session(session))
        }
    }
}

/// A one-line summary of who the pupil is.
pub fn describe_session(session: &Session) -> String {
    let config = session.config();
    format!(
        "Elev: {}, {}. trinn, tema: {}",
        config.pupil_identity, config.grade, config.topic
    )
}

fn render_profile(session: &Session) -> String {
    let profile = session.knowledge_profile();
    let mastered = if profile.mastered.is_empty() {
        "(ingenting)".to_string()
    } else {
        profile
            .mastered
            .iter()
            .map(|m| format!("  {}. trinn: {}", m.grade, m.skill))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("Kan:\n{}\nLærer nå:\n  {}", mastered, profile.in_progress)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

/// Reads lines from `input` until end of input or `/quit`, one turn at a time.
pub async fn run<R, W>(session: &mut Session, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_line(output, &describe_session(session)).await?;
    write_line(output, "Skriv /help for kommandoer.").await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let action = match parse_line(&line) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(e) => {
                write_line(output, &e.to_string()).await?;
                continue;
            }
        };

        let text = match action {
            Action::Quit => break,
            Action::Help => HELP.to_string(),
            Action::ShowModels => format!("Modeller: {}", session.roster().models().join(", ")),
            Action::ShowProfile => render_profile(session),
            Action::Session(command) => match session.handle(command).await {
                Ok(outcome) => render_outcome(&outcome, session),
                Err(e) => {
                    error!(error = %e, "Command failed");
                    format!("Feil: {}", e)
                }
            },
        };
        write_line(output, &text).await?;
    }

    info!(turns = session.conversation().len(), "Chat loop finished");
    Ok(())
}
