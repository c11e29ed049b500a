use serde::{Deserialize, Serialize};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    NotStarted,
    /// Pre-operative identity/role verification.
    TimeOut,
    InProgress,
    Complete,
}

/// A proposed step transition awaiting a yes/no from the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub proposed_step_key: String,
    pub prior_step_key: String,
    pub message: String,
}

/// Live state of one session.
///
/// Mutated only by `reducer::apply` and by the clock via [`SessionState::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Empty until the time-out completes.
    pub current_step_key: String,
    pub time_elapsed_in_step: u64,
    pub time_elapsed_in_session: u64,
    /// Session second at which the current step occurrence was checked in on.
    pub last_checkin_time: Option<u64>,
    pub pending_confirmation: Option<PendingConfirmation>,
    /// The attending has introduced themselves during the time-out.
    pub attending_verified: bool,
    pub attending_name: Option<String>,
    pub resident_name: Option<String>,
    /// Set by a silence command, cleared the next time the assistant speaks.
    pub muted: bool,
    pub last_spoken: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attending(attending_name: Option<String>) -> Self {
        Self {
            attending_name,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::TimeOut | SessionPhase::InProgress)
    }

    pub fn has_current_step(&self) -> bool {
        self.phase == SessionPhase::InProgress && !self.current_step_key.is_empty()
    }

    pub fn checked_in_this_step(&self) -> bool {
        self.last_checkin_time.is_some()
    }

    /// Advances the session clock. Only the clock moves elapsed time forward.
    pub fn tick(&mut self, seconds: u64) {
        if !self.is_active() {
            return;
        }
        self.time_elapsed_in_session = self.time_elapsed_in_session.saturating_add(seconds);
        if self.has_current_step() {
            self.time_elapsed_in_step = self.time_elapsed_in_step.saturating_add(seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_runs_while_active() {
        let mut state = SessionState::new();
        state.tick(5);
        assert_eq!(state.time_elapsed_in_session, 0);

        state.phase = SessionPhase::TimeOut;
        state.tick(5);
        assert_eq!(state.time_elapsed_in_session, 5);
        assert_eq!(state.time_elapsed_in_step, 0, "no step during the time-out");

        state.phase = SessionPhase::InProgress;
        state.current_step_key = "portPlacement".to_string();
        state.tick(3);
        assert_eq!(state.time_elapsed_in_session, 8);
        assert_eq!(state.time_elapsed_in_step, 3);

        state.phase = SessionPhase::Complete;
        state.tick(100);
        assert_eq!(state.time_elapsed_in_session, 8);
    }

    #[test]
    fn state_round_trips_camel_case_json() {
        let json = r#"{"currentStepKey":"portPlacement","timeElapsedInStep":501,"phase":"inProgress"}"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.current_step_key, "portPlacement");
        assert_eq!(state.time_elapsed_in_step, 501);
        assert_eq!(state.phase, SessionPhase::InProgress);
        assert!(state.pending_confirmation.is_none());

        let out = serde_json::to_value(&state).unwrap();
        assert_eq!(out["timeElapsedInStep"], 501);
        assert_eq!(out["lastCheckinTime"], serde_json::Value::Null);
    }
}
