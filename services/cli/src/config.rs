use pupil_core::gemini::DEFAULT_API_BASE;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Upper bound on the fallback pause, so repeated failovers stay interactive.
pub const MAX_BACKOFF_MS: u64 = 2000;

/// Why `pupil-sim` refused to start with the current environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set (in the environment or a .env file)")]
    MissingVar(String),
    #[error("{0} is invalid: {1}")]
    InvalidValue(String, String),
}

/// Settings for one `pupil-sim` run. Only the API key is required.
#[derive(Clone, Debug)]
pub struct Config {
    pub gemini_api_key: String,
    pub api_base: String,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
    pub curriculum_path: Option<PathBuf>,
    pub fallback_backoff: Duration,
    pub model_preference: Option<Vec<String>>,
}

impl Config {
    /// Reads the settings from the process environment, topped up from `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Tests control the environment themselves.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let api_base =
            std::env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);
        let curriculum_path = std::env::var("CURRICULUM_PATH").ok().map(PathBuf::from);

        let fallback_backoff = match std::env::var("FALLBACK_BACKOFF_MS") {
            Ok(raw) => {
                let ms = raw.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("FALLBACK_BACKOFF_MS".to_string(), e.to_string())
                })?;
                if ms > MAX_BACKOFF_MS {
                    return Err(ConfigError::InvalidValue(
                        "FALLBACK_BACKOFF_MS".to_string(),
                        format!("{} exceeds the maximum of {} ms", ms, MAX_BACKOFF_MS),
                    ));
                }
                Duration::from_millis(ms)
            }
            Err(_) => pupil_core::orchestrator::DEFAULT_BACKOFF,
        };

        let model_preference = std::env::var("MODEL_PREFERENCE")
            .ok()
            .map(|raw| parse_model_list(&raw))
            .filter(|models| !models.is_empty());

        Ok(Self {
            gemini_api_key,
            api_base,
            log_level,
            prompts_path,
            curriculum_path,
            fallback_backoff,
            model_preference,
        })
    }
}

/// Splits a comma-separated model list, dropping blanks.
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}
