//! Main Entrypoint for the Pupil Simulator
//!
//! This binary is responsible for:
//! 1. Parsing command line options and loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the shared services (Gemini client, prompts, curriculum).
//! 4. Starting a session and running the chat loop until EOF, `/quit` or Ctrl+C.

use anyhow::Context;
use clap::Parser;
use pupil_cli::{config::Config, repl};
use pupil_core::{
    curriculum::CurriculumTable,
    gemini::GeminiClient,
    orchestrator::Orchestrator,
    prompts::PromptTemplates,
    session::{DEFAULT_GRADE, DEFAULT_TOPIC, Session, SessionOptions, SessionServices},
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};

/// Practise explaining mathematics to a simulated pupil.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The pupil's grade, 1-10.
    #[arg(short, long, default_value_t = DEFAULT_GRADE)]
    grade: u8,

    /// The topic the pupil is learning.
    #[arg(short, long, default_value = DEFAULT_TOPIC)]
    topic: String,

    /// A fixed name for the pupil instead of a generated one.
    #[arg(short, long)]
    name: Option<String>,

    /// Seed for pupil name generation; random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated model list, tried in the given order.
    /// Overrides MODEL_PREFERENCE and model discovery.
    #[arg(long, value_delimiter = ',')]
    models: Option<Vec<String>>,
}

/// Listens for the `Ctrl+C` signal to end the chat.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received interrupt. Shutting down..."),
        Err(e) => {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they never interleave with the chat on stdout.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Initializing services...");

    // --- 3. Initialize Shared Services ---
    let templates = match &config.prompts_path {
        Some(path) => PromptTemplates::from_dir(path)
            .with_context(|| format!("Failed to load prompts from {}", path.display()))?,
        None => PromptTemplates::default(),
    };
    let curriculum = match &config.curriculum_path {
        Some(path) => CurriculumTable::from_json_file(path)?,
        None => CurriculumTable::lk20_mathematics(),
    };

    let gemini = Arc::new(GeminiClient::new(
        config.api_base.clone(),
        config.gemini_api_key.clone(),
    ));
    let services = SessionServices {
        orchestrator: Orchestrator::new(gemini.clone()).with_backoff(config.fallback_backoff),
        capabilities: gemini,
        templates,
        curriculum,
    };

    let model_preference_override = args
        .models
        .map(|models| {
            models
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|models| !models.is_empty())
        .or(config.model_preference.clone());

    let options = SessionOptions {
        grade: args.grade,
        topic: args.topic,
        pupil_identity: args.name,
        model_preference_override,
    };

    // --- 4. Start Session ---
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut session = Session::start(options, services, seed)
        .await
        .context("Failed to start session")?;
    info!(
        seed,
        primary_model = %session.roster().primary(),
        backoff_ms = config.fallback_backoff.as_millis() as u64,
        "Session ready. Starting chat..."
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    tokio::select! {
        result = repl::run(&mut session, stdin, &mut stdout) => result?,
        _ = shutdown_signal() => {}
    }

    info!("Chat ended.");
    Ok(())
}
