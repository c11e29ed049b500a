//! Error types shared across the core.
//!
//! The decision path never lets these reach the spoken channel: the engine logs
//! them and degrades to a silent action instead.

/// Failures looking up or loading procedure reference data.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("Procedure not found: {0}")]
    NotFound(String),
    #[error("Procedure '{0}' has no steps")]
    EmptyProcedure(String),
    #[error("Procedure '{procedure}' has duplicate step key '{key}'")]
    DuplicateStep { procedure: String, key: String },
    #[error("Step '{key}' in procedure '{procedure}' has min_seconds greater than max_seconds")]
    InvalidDuration { procedure: String, key: String },
    #[error("Duplicate procedure id: {0}")]
    DuplicateProcedure(String),
    #[error("Failed to read catalogue file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse catalogue: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures rendering a `{{name}}` template.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("No value supplied for placeholder '{0}'")]
    MissingValue(String),
    #[error("Unterminated placeholder starting at byte {0}")]
    Unterminated(usize),
}

/// Reasons a completion-service reply is rejected as an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Completion output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Completion output is not a JSON object")]
    NotAnObject,
    #[error("Unknown action '{0}'")]
    UnknownAction(String),
    #[error("Action {action} is missing required field '{field}'")]
    MissingField { action: String, field: String },
    #[error("Step '{0}' does not match any step of the procedure")]
    UnknownStep(String),
    #[error("Could not read a duration from '{0}'")]
    UnparseableDuration(String),
    #[error("Speech '{0}' states a duration that was not derived from session state")]
    InventedDuration(String),
    #[error("{0}")]
    NotAllowed(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}
