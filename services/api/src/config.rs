use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use veritas_core::completion::CompletionProvider;
use veritas_core::engine::DEFAULT_COMPLETION_TIMEOUT;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: CompletionProvider,
    pub openai_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub chat_model: String,
    pub completion_timeout: Duration,
    pub catalogue_path: Option<PathBuf>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// This function will look for a `.env` file in the current directory
    /// and load the following variables:
    ///
    /// *   `BIND_ADDRESS`: The address and port to bind the server to. Defaults to "0.0.0.0:3000".
    /// *   `COMPLETION_PROVIDER`: "openai", "gemini" or "offline". Defaults to "openai".
    /// *   `OPENAI_API_KEY` / `GEMINI_API_KEY`: Required by the matching provider.
    /// *   `CHAT_MODEL`: (Optional) Defaults to "gpt-4o".
    /// *   `COMPLETION_TIMEOUT_MS`: (Optional) Defaults to 8000.
    /// *   `CATALOGUE_PATH`: (Optional) JSON catalogue replacing the built-in procedures.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider = lookup("COMPLETION_PROVIDER")
            .unwrap_or_else(|| "openai".to_string())
            .parse::<CompletionProvider>()
            .map_err(|e| ConfigError::InvalidValue("COMPLETION_PROVIDER".to_string(), e))?;

        let openai_api_key = lookup("OPENAI_API_KEY").map(SecretString::from);
        let gemini_api_key = lookup("GEMINI_API_KEY").map(SecretString::from);

        let chat_model = lookup("CHAT_MODEL").unwrap_or_else(|| "gpt-4o".to_string());

        let completion_timeout = match lookup("COMPLETION_TIMEOUT_MS") {
            Some(ms) => ms
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "COMPLETION_TIMEOUT_MS".to_string(),
                        format!("'{ms}' is not a positive number of milliseconds"),
                    )
                })?,
            None => DEFAULT_COMPLETION_TIMEOUT,
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // Validate that the required API key is present for the selected provider.
        match provider {
            CompletionProvider::OpenAi if openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                ));
            }
            CompletionProvider::Gemini if gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                ));
            }
            _ => {}
        }

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            completion_timeout,
            catalogue_path: lookup("CATALOGUE_PATH").map(PathBuf::from),
            log_level,
        })
    }
}
