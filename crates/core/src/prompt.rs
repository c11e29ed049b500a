use crate::catalogue::Procedure;
use crate::completion::CompletionRequest;
use crate::error::TemplateError;
use crate::state::SessionState;
use crate::template::{PromptTemplate, placeholders, render_with};
use crate::transcript::{TranscriptEntry, render_lines};
use crate::validate::SPEAK_PLACEHOLDERS;
use std::collections::{BTreeMap, HashMap};

pub const SYSTEM_PROMPT_KEY: &str = "live_assistant_system";
pub const CONTEXT_PROMPT_KEY: &str = "live_assistant_context";

const DEFAULT_SYSTEM: &str = include_str!("../prompts/live_assistant_system.md");
const DEFAULT_CONTEXT: &str = include_str!("../prompts/live_assistant_context.md");

const SYSTEM_PARAMS: [&str; 2] = ["procedure", "steps"];
const CONTEXT_PARAMS: [&str; 4] = ["attending", "currentStep", "sessionState", "transcript"];

fn warn_unknown(key: &str, template: &str, params: &[&str]) {
    for name in placeholders(template) {
        if !params.contains(&name.as_str()) && !SPEAK_PLACEHOLDERS.contains(&name.as_str()) {
            tracing::warn!(prompt = key, placeholder = %name, "Prompt override uses an unknown placeholder");
        }
    }
}

/// The two templates that make up a live-assistant request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    system: PromptTemplate,
    context: PromptTemplate,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptSet {
    pub fn builtin() -> Self {
        Self {
            system: PromptTemplate::new(DEFAULT_SYSTEM),
            context: PromptTemplate::new(DEFAULT_CONTEXT),
        }
    }

    /// Replaces templates found in a loaded prompt directory, keyed by file stem.
    ///
    /// Unknown placeholders are only warned about here; they fail at `build`.
    pub fn with_overrides(mut self, prompts: &HashMap<String, String>) -> Self {
        if let Some(system) = prompts.get(SYSTEM_PROMPT_KEY) {
            warn_unknown(SYSTEM_PROMPT_KEY, system, &SYSTEM_PARAMS);
            self.system = PromptTemplate::new(system.clone());
        }
        if let Some(context) = prompts.get(CONTEXT_PROMPT_KEY) {
            warn_unknown(CONTEXT_PROMPT_KEY, context, &CONTEXT_PARAMS);
            self.context = PromptTemplate::new(context.clone());
        }
        self
    }

    /// Builds the request for one evaluation.
    ///
    /// Speech placeholders in the system template are kept literally; they are
    /// the names the model is told to use and are filled in after it replies.
    pub fn build(
        &self,
        procedure: &Procedure,
        state: &SessionState,
        window: &[TranscriptEntry],
    ) -> Result<CompletionRequest, TemplateError> {
        let steps = procedure.step_outline();
        let system = render_with(self.system.source(), |name| match name {
            "procedure" => Some(procedure.name.clone()),
            "steps" => Some(steps.clone()),
            other if SPEAK_PLACEHOLDERS.contains(&other) => Some(format!("{{{{{other}}}}}")),
            _ => None,
        })?;

        let session_state =
            serde_json::to_string_pretty(state).unwrap_or_else(|_| "{}".to_string());
        let params = BTreeMap::from([
            (
                "attending",
                state
                    .attending_name
                    .as_deref()
                    .map(|name| format!("Dr. {name}"))
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            (
                "currentStep",
                procedure
                    .step_name(&state.current_step_key)
                    .unwrap_or("not started")
                    .to_string(),
            ),
            ("sessionState", session_state),
            ("transcript", render_lines(window)),
        ]);
        let user = self.context.render(&params)?;

        Ok(CompletionRequest { system, user })
    }
}
