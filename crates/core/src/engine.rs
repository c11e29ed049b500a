use crate::action::{AssistantAction, parse_wire};
use crate::catalogue::{Procedure, ProcedureStep};
use crate::completion::CompletionService;
use crate::messages;
use crate::prompt::PromptSet;
use crate::state::{PendingConfirmation, SessionPhase, SessionState};
use crate::text::normalize;
use crate::transcript::TranscriptEntry;
use crate::triggers::{self, Role, StepIntent, TimeScope};
use crate::validate::{backfill, sanitize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub wake_phrases: Vec<String>,
    /// Instruments recorded as notes when requested.
    pub instruments: Vec<String>,
    /// Past this the completion call is abandoned and the engine stays silent.
    pub completion_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wake_phrases: triggers::DEFAULT_WAKE_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            instruments: triggers::DEFAULT_INSTRUMENTS
                .iter()
                .map(|i| i.to_string())
                .collect(),
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }
}

/// Decides what the assistant does after each finalized utterance.
///
/// Fixed triggers are handled here without the model. The completion service
/// is consulted only when the assistant is addressed and nothing deterministic
/// applies, and whatever it returns goes through `validate::sanitize`.
pub struct DecisionEngine {
    completion: Arc<dyn CompletionService>,
    prompts: PromptSet,
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            prompts: PromptSet::builtin(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluates the latest finalized entry of `window` against the session.
    ///
    /// Never fails: every error path degrades to `NONE`.
    pub async fn evaluate(
        &self,
        window: &[TranscriptEntry],
        state: &SessionState,
        procedure: &Procedure,
    ) -> AssistantAction {
        let Some(latest) = window.iter().rev().find(|e| e.is_final) else {
            return AssistantAction::none();
        };
        if state.phase == SessionPhase::Complete {
            return AssistantAction::none();
        }

        if triggers::is_session_start(&latest.text) {
            return if state.phase == SessionPhase::NotStarted {
                info!("Session start: opening the time-out");
                AssistantAction::StartTimeout {
                    speak: messages::START_TIMEOUT.to_string(),
                }
            } else {
                AssistantAction::none()
            };
        }

        let normalized = normalize(&latest.text);
        let addressed = triggers::is_addressed(&normalized, &self.config.wake_phrases);

        let action = if triggers::is_silence_command(&normalized) {
            info!("Silence requested");
            AssistantAction::None { mute: true }
        } else if let Some(action) = self.deterministic(&normalized, addressed, state, procedure) {
            action
        } else if addressed {
            self.consult(window, state, procedure).await
        } else {
            AssistantAction::none()
        };

        let action = self.finalize(action, state, addressed);
        debug!(action = %action.kind(), addressed, "Evaluated utterance");
        action
    }

    /// Proposes a progress check-in once the step passes 75% of its estimate.
    ///
    /// Fires at most once per step occurrence: the reducer records the check-in
    /// and a step change clears the marker.
    pub fn check_in(&self, state: &SessionState, procedure: &Procedure) -> AssistantAction {
        if !state.has_current_step()
            || state.checked_in_this_step()
            || state.pending_confirmation.is_some()
            || state.muted
        {
            return AssistantAction::none();
        }
        let Some(step) = procedure.step(&state.current_step_key) else {
            return AssistantAction::none();
        };
        if state.time_elapsed_in_step < step.checkin_threshold() {
            return AssistantAction::none();
        }

        info!(step = %step.key, elapsed = state.time_elapsed_in_step, "Check-in due");
        AssistantAction::CheckIn {
            speak: messages::check_in(
                state.attending_name.as_deref(),
                &step.name,
                state.time_elapsed_in_step,
            ),
        }
    }

    fn deterministic(
        &self,
        normalized: &str,
        addressed: bool,
        state: &SessionState,
        procedure: &Procedure,
    ) -> Option<AssistantAction> {
        if state.phase == SessionPhase::TimeOut {
            if let Some(action) = timeout_reply(normalized, state, procedure) {
                return Some(action);
            }
        }

        if let Some(scope) = triggers::time_query(normalized, addressed) {
            if let Some(action) = time_reply(scope, state, procedure) {
                return Some(action);
            }
        }

        if state.has_current_step() {
            if let Some(action) = step_reply(normalized, state, procedure) {
                return Some(action);
            }
        }

        triggers::instrument_request(normalized, &self.config.instruments).map(|instrument| {
            AssistantAction::LogNote {
                note: messages::instrument_requested(instrument),
            }
        })
    }

    async fn consult(
        &self,
        window: &[TranscriptEntry],
        state: &SessionState,
        procedure: &Procedure,
    ) -> AssistantAction {
        let request = match self.prompts.build(procedure, state, window) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Could not render the live assistant prompt");
                return AssistantAction::none();
            }
        };

        let reply = match tokio::time::timeout(
            self.config.completion_timeout,
            self.completion.complete(&request),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!("Completion service failed: {e:#}");
                return AssistantAction::none();
            }
            Err(_) => {
                warn!(
                    "Completion service timed out after {:?}",
                    self.config.completion_timeout
                );
                return AssistantAction::none();
            }
        };

        match parse_wire(&reply).and_then(|wire| sanitize(&wire, state, procedure)) {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, reply = %reply, "Discarding completion output");
                AssistantAction::none()
            }
        }
    }

    /// Applies the gates that hold for every source of actions.
    fn finalize(
        &self,
        action: AssistantAction,
        state: &SessionState,
        addressed: bool,
    ) -> AssistantAction {
        if state.muted && !addressed && action.spoken_text().is_some() {
            debug!(action = %action.kind(), "Muted: dropping speech");
            return action.silenced();
        }

        let repeats_last = action.spoken_text().is_some()
            && action.spoken_text() == state.last_spoken.as_deref();
        let announces_only = matches!(
            action,
            AssistantAction::Speak { .. }
                | AssistantAction::SpeakAndConfirm { .. }
                | AssistantAction::CheckIn { .. }
        );
        if repeats_last && announces_only && !addressed {
            debug!(action = %action.kind(), "Suppressing repeated speech");
            return AssistantAction::none();
        }
        action
    }
}

fn timeout_reply(
    normalized: &str,
    state: &SessionState,
    procedure: &Procedure,
) -> Option<AssistantAction> {
    let intro = triggers::introduction(normalized)?;

    if !state.attending_verified {
        if intro.role == Some(Role::Resident) {
            return Some(AssistantAction::speak(messages::ATTENDING_FIRST));
        }
        let name = intro.name.or_else(|| state.attending_name.clone());
        return Some(AssistantAction::Speak {
            speak: messages::attending_acknowledged(name.as_deref()),
            attending_verified: true,
            attending_name: name,
        });
    }

    if intro.role == Some(Role::Attending) {
        return None;
    }
    let first = procedure.first_step()?;
    Some(AssistantAction::CompleteTimeout {
        step_key: first.key.clone(),
        speak: Some(messages::timeout_complete(&first.name)),
        resident_name: intro.name,
    })
}

/// Time answers come only from the session clock.
fn time_reply(
    scope: TimeScope,
    state: &SessionState,
    procedure: &Procedure,
) -> Option<AssistantAction> {
    if !state.is_active() {
        return None;
    }
    let step_name = procedure.step_name(&state.current_step_key);
    let speak = match (scope, step_name) {
        (TimeScope::Step, Some(name)) if state.has_current_step() => {
            messages::time_in_step(name, state.time_elapsed_in_step)
        }
        _ => messages::time_in_session(state.time_elapsed_in_session),
    };
    Some(AssistantAction::speak(speak))
}

/// Step progression while the procedure is underway, in precedence order.
fn step_reply(
    normalized: &str,
    state: &SessionState,
    procedure: &Procedure,
) -> Option<AssistantAction> {
    let mentions = procedure.mentions(normalized);

    if let Some(pending) = &state.pending_confirmation {
        if let Some(action) = resolve_pending(pending, normalized, &mentions, procedure) {
            return Some(action);
        }
    }

    if let Some(offset) = triggers::correction_offset(normalized) {
        if let Some(step) = corrected_step(normalized, &mentions, procedure) {
            info!(step = %step.key, offset, "Back-filling step timeline");
            return Some(backfill(step, offset, state));
        }
    }

    if let Some(intent) = triggers::step_intent(normalized, !mentions.is_empty()) {
        if let Some(action) = explicit_change(intent, &mentions, state, procedure) {
            return Some(action);
        }
    }

    implicit_proposal(normalized, state, procedure)
}

fn resolve_pending(
    pending: &PendingConfirmation,
    normalized: &str,
    mentions: &[&ProcedureStep],
    procedure: &Procedure,
) -> Option<AssistantAction> {
    let proposed = procedure.step(&pending.proposed_step_key)?;
    let prior_name = procedure
        .step_name(&pending.prior_step_key)
        .unwrap_or(pending.prior_step_key.as_str());
    let names_prior = mentions.iter().any(|s| s.key == pending.prior_step_key);
    let names_proposed = mentions.iter().any(|s| s.key == proposed.key);

    if triggers::is_rejection(normalized) || (names_prior && !names_proposed) {
        return Some(AssistantAction::RevertStep {
            step_key: pending.prior_step_key.clone(),
            speak: Some(messages::revert_step(prior_name)),
        });
    }
    if triggers::is_affirmation(normalized)
        || names_proposed
        || proposed.cue_in(normalized).is_some()
    {
        return Some(AssistantAction::ChangeStep {
            step_key: proposed.key.clone(),
            speak: Some(messages::step_changed(Some(prior_name), &proposed.name)),
        });
    }
    None
}

/// The step the team says they are really on in a "... N minutes ago" correction.
fn corrected_step<'p>(
    normalized: &str,
    mentions: &[&'p ProcedureStep],
    procedure: &'p Procedure,
) -> Option<&'p ProcedureStep> {
    match mentions {
        [] => None,
        [only] if triggers::mentions_finishing(normalized) => procedure.next_step(&only.key),
        [only] => Some(*only),
        several => several
            .iter()
            .copied()
            .max_by_key(|s| procedure.index_of(&s.key)),
    }
}

fn explicit_change(
    intent: StepIntent,
    mentions: &[&ProcedureStep],
    state: &SessionState,
    procedure: &Procedure,
) -> Option<AssistantAction> {
    let current = state.current_step_key.as_str();
    // Naming the current step alongside another makes the other one the
    // target, whichever order they were said in.
    let other_than_current = if mentions.iter().any(|s| s.key == current) {
        mentions.iter().copied().find(|s| s.key != current)
    } else {
        None
    };
    let target = match (intent, other_than_current) {
        (StepIntent::Finished | StepIntent::Starting, Some(other)) => other,
        (StepIntent::Finished, None) => {
            let finished = mentions.first().copied().or_else(|| procedure.step(current))?;
            match mentions.get(1) {
                Some(started) => *started,
                None => match procedure.next_step(&finished.key) {
                    Some(next) => next,
                    None if finished.key == current => {
                        return Some(AssistantAction::speak(messages::final_step_complete(
                            &finished.name,
                        )));
                    }
                    None => return None,
                },
            }
        }
        (StepIntent::Starting, None) => mentions.last().copied()?,
        (StepIntent::Next, _) => mentions
            .last()
            .copied()
            .or_else(|| procedure.next_step(current))?,
    };

    if target.key == current {
        return None;
    }
    info!(from = %current, to = %target.key, "Explicit step change");
    Some(AssistantAction::ChangeStep {
        step_key: target.key.clone(),
        speak: Some(messages::step_changed(
            procedure.step_name(current),
            &target.name,
        )),
    })
}

/// A cue for the next step proposes it; the room has to confirm.
fn implicit_proposal(
    normalized: &str,
    state: &SessionState,
    procedure: &Procedure,
) -> Option<AssistantAction> {
    let next = procedure.next_step(&state.current_step_key)?;
    let cue = next.cue_in(normalized)?;
    Some(AssistantAction::SpeakAndConfirm {
        step_key: next.key.clone(),
        speak: messages::propose_step(Some(&cue.observation), &next.name),
    })
}
