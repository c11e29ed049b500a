//! Application Configuration Module
//!
//! Loads the settings of the Veritas CLI from environment variables (and a
//! `.env` file when present) into one struct passed throughout the runtime.

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use veritas_core::completion::CompletionProvider;
use veritas_core::engine::DEFAULT_COMPLETION_TIMEOUT;
use veritas_core::transcript::DEFAULT_WINDOW;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: CompletionProvider,
    pub openai_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub chat_model: String,
    pub log_level: Level,
    pub completion_timeout: Duration,
    pub transcript_window: usize,
    /// JSON catalogue replacing the built-in procedures.
    pub catalogue_path: Option<PathBuf>,
    /// Directory of `.md` prompt overrides.
    pub prompts_dir: Option<PathBuf>,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `COMPLETION_PROVIDER`: "openai", "gemini" or "offline". Defaults to "openai".
    // *   `OPENAI_API_KEY` / `GEMINI_API_KEY`: required by the matching provider.
    // *   `CHAT_MODEL`: (Optional) Defaults to "gpt-4o", or "gemini-1.5-flash" for gemini.
    // *   `COMPLETION_TIMEOUT_MS`: (Optional) Defaults to 8000.
    // *   `TRANSCRIPT_WINDOW`: (Optional) Finalized entries shown per evaluation. Defaults to 15.
    // *   `CATALOGUE_PATH`, `PROMPTS_DIR`: (Optional) overrides for the built-in data.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_str = lookup("COMPLETION_PROVIDER").unwrap_or_else(|| "openai".to_string());
        let provider = provider_str
            .parse::<CompletionProvider>()
            .map_err(|e| ConfigError::InvalidValue("COMPLETION_PROVIDER".to_string(), e))?;

        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let chat_model = lookup("CHAT_MODEL").unwrap_or_else(|| match provider {
            CompletionProvider::Gemini => "gemini-1.5-flash".to_string(),
            _ => "gpt-4o".to_string(),
        });

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let completion_timeout = match lookup("COMPLETION_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(parse_positive("COMPLETION_TIMEOUT_MS", &ms)?),
            None => DEFAULT_COMPLETION_TIMEOUT,
        };
        let transcript_window = match lookup("TRANSCRIPT_WINDOW") {
            Some(n) => parse_positive("TRANSCRIPT_WINDOW", &n)? as usize,
            None => DEFAULT_WINDOW,
        };

        let config = Self {
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            log_level,
            completion_timeout,
            transcript_window,
            catalogue_path: lookup("CATALOGUE_PATH").map(PathBuf::from),
            prompts_dir: lookup("PROMPTS_DIR").map(PathBuf::from),
        };

        // Validate that the required API key is present for the selected provider.
        match config.provider {
            CompletionProvider::OpenAi if config.openai_api_key.is_none() => Err(
                ConfigError::MissingVar("OPENAI_API_KEY must be set for openai provider".to_string()),
            ),
            CompletionProvider::Gemini if config.gemini_api_key.is_none() => Err(
                ConfigError::MissingVar("GEMINI_API_KEY must be set for gemini provider".to_string()),
            ),
            _ => Ok(config),
        }
    }
}

fn parse_positive(name: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{value}' is not a positive integer"),
        )),
    }
}
