//! Turns a completion-service reply into an action the reducer may apply.
//!
//! The model only picks an action and names things. Step keys are resolved
//! against the catalogue, live values are filled in from session state, and
//! every transition message is the fixed deterministic phrasing.

use crate::action::{ActionKind, AssistantAction, WireAction};
use crate::catalogue::{Procedure, ProcedureStep};
use crate::error::ActionError;
use crate::messages;
use crate::state::{SessionPhase, SessionState};
use crate::template::render_with;
use crate::text::{contains_any, normalize};
use crate::timefmt::{describe_ago, format_duration, parse_duration};

/// Placeholders a model may use in `speak` text.
pub const SPEAK_PLACEHOLDERS: &[&str] = &[
    "stepName",
    "nextStepName",
    "elapsedInStep",
    "elapsedInSession",
    "attendingName",
    "residentName",
    "procedureName",
];

/// Resolves a live-value placeholder against the session.
fn live_value(name: &str, state: &SessionState, procedure: &Procedure) -> Option<String> {
    match name {
        "stepName" => procedure.step_name(&state.current_step_key).map(str::to_string),
        "nextStepName" => procedure
            .next_step(&state.current_step_key)
            .map(|s| s.name.clone()),
        "elapsedInStep" => Some(format_duration(state.time_elapsed_in_step)),
        "elapsedInSession" => Some(format_duration(state.time_elapsed_in_session)),
        "attendingName" => state.attending_name.clone(),
        "residentName" => state.resident_name.clone(),
        "procedureName" => Some(procedure.name.clone()),
        _ => None,
    }
}

// Wording that presents a stated duration as time already spent in the case.
const ELAPSED_CLAIM: &[&str] = &[
    "ago",
    "been",
    "elapsed",
    "so far",
    "into",
    "has run",
    "ran for",
    "running",
    "started",
    "in total",
    "total",
];

/// Fills placeholders in model speech.
///
/// Speech that states elapsed time outright is rejected: it may only come from
/// the `elapsedInStep`/`elapsedInSession` placeholders. Other durations
/// ("two hours of battery") pass.
pub fn render_speech(
    template: &str,
    state: &SessionState,
    procedure: &Procedure,
) -> Result<String, ActionError> {
    if parse_duration(template).is_some() && contains_any(&normalize(template), ELAPSED_CLAIM) {
        return Err(ActionError::InventedDuration(template.to_string()));
    }
    Ok(render_with(template, |name| live_value(name, state, procedure))?)
}

fn not_allowed(kind: ActionKind, state: &SessionState) -> ActionError {
    ActionError::NotAllowed(format!(
        "{kind} is not accepted from the model in phase {:?}",
        state.phase
    ))
}

fn resolve<'p>(procedure: &'p Procedure, query: &str) -> Result<&'p ProcedureStep, ActionError> {
    procedure
        .resolve_step(query)
        .ok_or_else(|| ActionError::UnknownStep(query.to_string()))
}

/// Validates a parsed reply against the current session.
pub fn sanitize(
    wire: &WireAction,
    state: &SessionState,
    procedure: &Procedure,
) -> Result<AssistantAction, ActionError> {
    let kind = wire.kind()?;
    let in_progress = state.phase == SessionPhase::InProgress;
    let current_name = procedure.step_name(&state.current_step_key);

    let action = match kind {
        ActionKind::None => AssistantAction::none(),

        ActionKind::StartTimeout if state.phase == SessionPhase::NotStarted => {
            AssistantAction::StartTimeout {
                speak: messages::START_TIMEOUT.to_string(),
            }
        }

        ActionKind::Speak => {
            let text = wire.speak_text().ok_or_else(|| ActionError::MissingField {
                action: wire.action.clone(),
                field: "speak".to_string(),
            })?;
            AssistantAction::speak(render_speech(text, state, procedure)?)
        }

        ActionKind::CompleteTimeout
            if state.phase == SessionPhase::TimeOut && state.attending_verified =>
        {
            let first = procedure
                .first_step()
                .ok_or_else(|| ActionError::UnknownStep("<first step>".to_string()))?;
            AssistantAction::CompleteTimeout {
                step_key: first.key.clone(),
                speak: Some(messages::timeout_complete(&first.name)),
                resident_name: wire.payload_str("residentName").map(str::to_string),
            }
        }

        ActionKind::ChangeStep if in_progress => {
            let step = resolve(procedure, wire.require_str("stepKey")?)?;
            if step.key == state.current_step_key {
                return Err(ActionError::NotAllowed(format!(
                    "{} is already the current step",
                    step.key
                )));
            }
            AssistantAction::ChangeStep {
                step_key: step.key.clone(),
                speak: Some(messages::step_changed(current_name, &step.name)),
            }
        }

        ActionKind::SpeakAndConfirm if in_progress => {
            let step = resolve(procedure, wire.require_str("stepKey")?)?;
            if step.key == state.current_step_key {
                return Err(ActionError::NotAllowed(format!(
                    "{} is already the current step",
                    step.key
                )));
            }
            AssistantAction::SpeakAndConfirm {
                step_key: step.key.clone(),
                speak: messages::propose_step(None, &step.name),
            }
        }

        ActionKind::RevertStep if in_progress => {
            let pending = state
                .pending_confirmation
                .as_ref()
                .ok_or_else(|| ActionError::NotAllowed("no step change is pending".to_string()))?;
            let prior = procedure
                .step_name(&pending.prior_step_key)
                .unwrap_or(pending.prior_step_key.as_str());
            AssistantAction::RevertStep {
                step_key: pending.prior_step_key.clone(),
                speak: Some(messages::revert_step(prior)),
            }
        }

        ActionKind::CorrectAndBackfill if in_progress => {
            let step = resolve(procedure, wire.require_str("correctStepKey")?)?;
            let ago_text = wire.require_str("startTimeAgo")?;
            let offset = parse_duration(ago_text)
                .ok_or_else(|| ActionError::UnparseableDuration(ago_text.to_string()))?;
            backfill(step, offset, state)
        }

        ActionKind::LogNote => {
            let note = wire
                .payload_str("note")
                .or_else(|| wire.speak_text())
                .ok_or_else(|| ActionError::MissingField {
                    action: wire.action.clone(),
                    field: "note".to_string(),
                })?;
            AssistantAction::LogNote {
                note: note.to_string(),
            }
        }

        // Check-ins are scheduled by the clock, never by the model.
        other => return Err(not_allowed(other, state)),
    };

    Ok(action)
}

/// Back-fills `step` as having started `offset` seconds ago, capped at session time.
pub fn backfill(step: &ProcedureStep, offset: u64, state: &SessionState) -> AssistantAction {
    let elapsed = offset.min(state.time_elapsed_in_session);
    let start_time_ago = describe_ago(elapsed);
    AssistantAction::CorrectAndBackfill {
        correct_step_key: step.key.clone(),
        speak: Some(messages::backfilled(&step.name, &start_time_ago)),
        start_time_ago,
        elapsed_seconds: elapsed,
    }
}
