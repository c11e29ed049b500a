//! The single place where decisions change session state.

use crate::action::AssistantAction;
use crate::state::{PendingConfirmation, SessionPhase, SessionState};

/// Applies `action` to `state`, returning the next state.
///
/// Pure and deterministic. Elapsed time is never advanced here; only
/// [`SessionState::tick`] does that. A completed session ignores every action.
pub fn apply(state: &SessionState, action: &AssistantAction) -> SessionState {
    let mut next = state.clone();
    if next.phase == SessionPhase::Complete {
        return next;
    }

    match action {
        AssistantAction::None { mute } => {
            if *mute {
                next.muted = true;
            }
        }
        AssistantAction::StartTimeout { .. } => {
            if next.phase == SessionPhase::NotStarted {
                next.phase = SessionPhase::TimeOut;
            }
        }
        AssistantAction::Speak {
            attending_verified,
            attending_name,
            ..
        } => {
            if *attending_verified && next.phase == SessionPhase::TimeOut {
                next.attending_verified = true;
                if attending_name.is_some() {
                    next.attending_name = attending_name.clone();
                }
            }
        }
        AssistantAction::CompleteTimeout {
            step_key,
            resident_name,
            ..
        } => {
            if next.phase == SessionPhase::TimeOut {
                next.phase = SessionPhase::InProgress;
                enter_step(&mut next, step_key, 0);
                if resident_name.is_some() {
                    next.resident_name = resident_name.clone();
                }
            }
        }
        AssistantAction::ChangeStep { step_key, .. } => {
            if next.phase == SessionPhase::InProgress {
                enter_step(&mut next, step_key, 0);
            }
        }
        AssistantAction::SpeakAndConfirm { step_key, speak } => {
            if next.phase == SessionPhase::InProgress {
                next.pending_confirmation = Some(PendingConfirmation {
                    proposed_step_key: step_key.clone(),
                    prior_step_key: next.current_step_key.clone(),
                    message: speak.clone(),
                });
            }
        }
        AssistantAction::RevertStep { step_key, .. } => {
            next.pending_confirmation = None;
            if next.phase == SessionPhase::InProgress && next.current_step_key != *step_key {
                enter_step(&mut next, step_key, 0);
            }
        }
        AssistantAction::CorrectAndBackfill {
            correct_step_key,
            elapsed_seconds,
            ..
        } => {
            if next.phase == SessionPhase::InProgress {
                let elapsed = (*elapsed_seconds).min(next.time_elapsed_in_session);
                enter_step(&mut next, correct_step_key, elapsed);
            }
        }
        AssistantAction::CheckIn { .. } => {
            if next.has_current_step() {
                next.last_checkin_time = Some(next.time_elapsed_in_session);
            }
        }
        // Notes live beside the state, not in it.
        AssistantAction::LogNote { .. } => {}
    }

    if let Some(text) = action.spoken_text() {
        next.muted = false;
        next.last_spoken = Some(text.to_string());
    }
    next
}

fn enter_step(state: &mut SessionState, step_key: &str, elapsed_in_step: u64) {
    state.current_step_key = step_key.to_string();
    state.time_elapsed_in_step = elapsed_in_step;
    state.pending_confirmation = None;
    state.last_checkin_time = None;
}

/// Marks the session finished. Later actions are dropped by [`apply`].
pub fn complete(state: &SessionState) -> SessionState {
    SessionState {
        phase: SessionPhase::Complete,
        pending_confirmation: None,
        ..state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages;

    fn in_progress(step: &str) -> SessionState {
        SessionState {
            phase: SessionPhase::InProgress,
            current_step_key: step.to_string(),
            time_elapsed_in_step: 400,
            time_elapsed_in_session: 1200,
            last_checkin_time: Some(1100),
            ..SessionState::default()
        }
    }

    #[test]
    fn timeout_walks_through_its_phases() {
        let state = SessionState::new();
        let state = apply(
            &state,
            &AssistantAction::StartTimeout {
                speak: messages::START_TIMEOUT.to_string(),
            },
        );
        assert_eq!(state.phase, SessionPhase::TimeOut);
        assert_eq!(state.last_spoken.as_deref(), Some(messages::START_TIMEOUT));

        let state = apply(
            &state,
            &AssistantAction::Speak {
                speak: messages::attending_acknowledged(Some("Smith")),
                attending_verified: true,
                attending_name: Some("Smith".to_string()),
            },
        );
        assert!(state.attending_verified);
        assert_eq!(state.attending_name.as_deref(), Some("Smith"));
        assert_eq!(state.phase, SessionPhase::TimeOut);

        let state = apply(
            &state,
            &AssistantAction::CompleteTimeout {
                step_key: "portPlacement".to_string(),
                speak: Some(messages::timeout_complete("Port Placement")),
                resident_name: Some("Doe".to_string()),
            },
        );
        assert_eq!(state.phase, SessionPhase::InProgress);
        assert_eq!(state.current_step_key, "portPlacement");
        assert_eq!(state.time_elapsed_in_step, 0);
        assert_eq!(state.resident_name.as_deref(), Some("Doe"));
    }

    #[test]
    fn change_step_resets_step_markers() {
        let mut state = in_progress("portPlacement");
        state.pending_confirmation = Some(PendingConfirmation {
            proposed_step_key: "robotDocking".to_string(),
            prior_step_key: "portPlacement".to_string(),
            message: String::new(),
        });
        let next = apply(
            &state,
            &AssistantAction::ChangeStep {
                step_key: "robotDocking".to_string(),
                speak: None,
            },
        );
        assert_eq!(next.current_step_key, "robotDocking");
        assert_eq!(next.time_elapsed_in_step, 0);
        assert_eq!(next.time_elapsed_in_session, 1200);
        assert!(next.pending_confirmation.is_none());
        assert!(next.last_checkin_time.is_none());
        assert_eq!(next.last_spoken, None);
    }

    #[test]
    fn confirmation_round_trip() {
        let state = in_progress("portPlacement");
        let proposed = apply(
            &state,
            &AssistantAction::SpeakAndConfirm {
                step_key: "robotDocking".to_string(),
                speak: "Please confirm.".to_string(),
            },
        );
        assert_eq!(proposed.current_step_key, "portPlacement");
        let pending = proposed.pending_confirmation.clone().unwrap();
        assert_eq!(pending.proposed_step_key, "robotDocking");
        assert_eq!(pending.prior_step_key, "portPlacement");
        assert_eq!(pending.message, "Please confirm.");

        let reverted = apply(
            &proposed,
            &AssistantAction::RevertStep {
                step_key: "portPlacement".to_string(),
                speak: None,
            },
        );
        assert_eq!(reverted.current_step_key, "portPlacement");
        assert_eq!(reverted.time_elapsed_in_step, 400, "reverting keeps the step clock");
        assert!(reverted.pending_confirmation.is_none());
    }

    #[test]
    fn backfill_sets_elapsed_from_the_offset() {
        let state = in_progress("robotDocking");
        let next = apply(
            &state,
            &AssistantAction::CorrectAndBackfill {
                correct_step_key: "calotTriangleDissection".to_string(),
                start_time_ago: "approximately 5 minutes".to_string(),
                elapsed_seconds: 300,
                speak: None,
            },
        );
        assert_eq!(next.current_step_key, "calotTriangleDissection");
        assert_eq!(next.time_elapsed_in_step, 300);

        let capped = apply(
            &state,
            &AssistantAction::CorrectAndBackfill {
                correct_step_key: "calotTriangleDissection".to_string(),
                start_time_ago: "approximately 1 hour".to_string(),
                elapsed_seconds: 3600,
                speak: None,
            },
        );
        assert_eq!(capped.time_elapsed_in_step, 1200);
    }

    #[test]
    fn check_in_marks_the_current_step() {
        let mut state = in_progress("portPlacement");
        state.last_checkin_time = None;
        let next = apply(
            &state,
            &AssistantAction::CheckIn {
                speak: "How is it going?".to_string(),
            },
        );
        assert_eq!(next.last_checkin_time, Some(1200));
    }

    #[test]
    fn silence_persists_until_the_assistant_speaks() {
        let state = in_progress("portPlacement");
        let muted = apply(&state, &AssistantAction::None { mute: true });
        assert!(muted.muted);

        let still_muted = apply(
            &muted,
            &AssistantAction::LogNote {
                note: "User requested scalpel.".to_string(),
            },
        );
        assert!(still_muted.muted);

        let spoken = apply(&still_muted, &AssistantAction::speak("I'm here."));
        assert!(!spoken.muted);
    }

    #[test]
    fn completed_sessions_ignore_late_actions() {
        let done = complete(&in_progress("portPlacement"));
        let next = apply(
            &done,
            &AssistantAction::ChangeStep {
                step_key: "robotDocking".to_string(),
                speak: Some("late".to_string()),
            },
        );
        assert_eq!(next, done);
    }

    #[test]
    fn step_actions_are_ignored_before_the_procedure_starts() {
        let fresh = SessionState::new();
        let next = apply(
            &fresh,
            &AssistantAction::ChangeStep {
                step_key: "robotDocking".to_string(),
                speak: None,
            },
        );
        assert_eq!(next.current_step_key, "");
        assert_eq!(next.phase, SessionPhase::NotStarted);
    }
}
