use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// The closed set of action names exchanged with the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    None,
    StartTimeout,
    Speak,
    CompleteTimeout,
    ChangeStep,
    SpeakAndConfirm,
    RevertStep,
    CorrectAndBackfill,
    CheckIn,
    LogNote,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::None,
        ActionKind::StartTimeout,
        ActionKind::Speak,
        ActionKind::CompleteTimeout,
        ActionKind::ChangeStep,
        ActionKind::SpeakAndConfirm,
        ActionKind::RevertStep,
        ActionKind::CorrectAndBackfill,
        ActionKind::CheckIn,
        ActionKind::LogNote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::None => "NONE",
            ActionKind::StartTimeout => "START_TIMEOUT",
            ActionKind::Speak => "SPEAK",
            ActionKind::CompleteTimeout => "COMPLETE_TIMEOUT",
            ActionKind::ChangeStep => "CHANGE_STEP",
            ActionKind::SpeakAndConfirm => "SPEAK_AND_CONFIRM",
            ActionKind::RevertStep => "REVERT_STEP",
            ActionKind::CorrectAndBackfill => "CORRECT_AND_BACKFILL",
            ActionKind::CheckIn => "CHECK_IN",
            ActionKind::LogNote => "LOG_NOTE",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| ActionError::UnknownAction(s.to_string()))
    }
}

/// One decision of the assistant, already validated against the session.
///
/// Produced once per evaluation and consumed immediately by `reducer::apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantAction {
    None {
        /// A silence command was heard; speech stays off until addressed again.
        mute: bool,
    },
    StartTimeout {
        speak: String,
    },
    Speak {
        speak: String,
        /// Set when this acknowledges the attending's introduction.
        attending_verified: bool,
        attending_name: Option<String>,
    },
    CompleteTimeout {
        step_key: String,
        speak: Option<String>,
        resident_name: Option<String>,
    },
    ChangeStep {
        step_key: String,
        speak: Option<String>,
    },
    SpeakAndConfirm {
        step_key: String,
        speak: String,
    },
    RevertStep {
        step_key: String,
        speak: Option<String>,
    },
    CorrectAndBackfill {
        correct_step_key: String,
        start_time_ago: String,
        elapsed_seconds: u64,
        speak: Option<String>,
    },
    CheckIn {
        speak: String,
    },
    LogNote {
        note: String,
    },
}

impl Default for AssistantAction {
    fn default() -> Self {
        Self::none()
    }
}

impl AssistantAction {
    pub fn none() -> Self {
        AssistantAction::None { mute: false }
    }

    pub fn speak(text: impl Into<String>) -> Self {
        AssistantAction::Speak {
            speak: text.into(),
            attending_verified: false,
            attending_name: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            AssistantAction::None { .. } => ActionKind::None,
            AssistantAction::StartTimeout { .. } => ActionKind::StartTimeout,
            AssistantAction::Speak { .. } => ActionKind::Speak,
            AssistantAction::CompleteTimeout { .. } => ActionKind::CompleteTimeout,
            AssistantAction::ChangeStep { .. } => ActionKind::ChangeStep,
            AssistantAction::SpeakAndConfirm { .. } => ActionKind::SpeakAndConfirm,
            AssistantAction::RevertStep { .. } => ActionKind::RevertStep,
            AssistantAction::CorrectAndBackfill { .. } => ActionKind::CorrectAndBackfill,
            AssistantAction::CheckIn { .. } => ActionKind::CheckIn,
            AssistantAction::LogNote { .. } => ActionKind::LogNote,
        }
    }

    /// Text to hand to the speech output adapter, if any.
    pub fn spoken_text(&self) -> Option<&str> {
        match self {
            AssistantAction::StartTimeout { speak }
            | AssistantAction::Speak { speak, .. }
            | AssistantAction::SpeakAndConfirm { speak, .. }
            | AssistantAction::CheckIn { speak } => Some(speak),
            AssistantAction::CompleteTimeout { speak, .. }
            | AssistantAction::ChangeStep { speak, .. }
            | AssistantAction::RevertStep { speak, .. }
            | AssistantAction::CorrectAndBackfill { speak, .. } => speak.as_deref(),
            AssistantAction::None { .. } | AssistantAction::LogNote { .. } => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AssistantAction::None { .. })
    }

    /// Strips speech while the room has asked for silence.
    ///
    /// State transitions survive without their announcement; actions that only
    /// exist to be heard become `NONE`.
    pub fn silenced(self) -> Self {
        match self {
            AssistantAction::StartTimeout { .. }
            | AssistantAction::Speak { .. }
            | AssistantAction::SpeakAndConfirm { .. }
            | AssistantAction::CheckIn { .. } => AssistantAction::none(),
            AssistantAction::CompleteTimeout {
                step_key,
                resident_name,
                ..
            } => AssistantAction::CompleteTimeout {
                step_key,
                speak: None,
                resident_name,
            },
            AssistantAction::ChangeStep { step_key, .. } => AssistantAction::ChangeStep {
                step_key,
                speak: None,
            },
            AssistantAction::RevertStep { step_key, .. } => AssistantAction::RevertStep {
                step_key,
                speak: None,
            },
            AssistantAction::CorrectAndBackfill {
                correct_step_key,
                start_time_ago,
                elapsed_seconds,
                ..
            } => AssistantAction::CorrectAndBackfill {
                correct_step_key,
                start_time_ago,
                elapsed_seconds,
                speak: None,
            },
            other @ (AssistantAction::None { .. } | AssistantAction::LogNote { .. }) => other,
        }
    }

    /// The `{action, payload?, speak?}` shape used on the wire.
    pub fn to_wire(&self) -> WireAction {
        let payload = match self {
            AssistantAction::None { mute } => mute.then(|| json!({ "mute": true })),
            AssistantAction::StartTimeout { .. } | AssistantAction::CheckIn { .. } => None,
            AssistantAction::Speak {
                attending_verified,
                attending_name,
                ..
            } => attending_verified.then(|| {
                let mut payload = Map::new();
                payload.insert("attendingVerified".into(), Value::Bool(true));
                if let Some(name) = attending_name {
                    payload.insert("attendingName".into(), Value::String(name.clone()));
                }
                Value::Object(payload)
            }),
            AssistantAction::CompleteTimeout {
                step_key,
                resident_name,
                ..
            } => {
                let mut payload = Map::new();
                payload.insert("stepKey".into(), Value::String(step_key.clone()));
                if let Some(name) = resident_name {
                    payload.insert("residentName".into(), Value::String(name.clone()));
                }
                Some(Value::Object(payload))
            }
            AssistantAction::ChangeStep { step_key, .. }
            | AssistantAction::SpeakAndConfirm { step_key, .. }
            | AssistantAction::RevertStep { step_key, .. } => Some(json!({ "stepKey": step_key })),
            AssistantAction::CorrectAndBackfill {
                correct_step_key,
                start_time_ago,
                elapsed_seconds,
                ..
            } => Some(json!({
                "correctStepKey": correct_step_key,
                "startTimeAgo": start_time_ago,
                "elapsedSeconds": elapsed_seconds,
            })),
            AssistantAction::LogNote { note } => Some(json!({ "note": note })),
        };

        WireAction {
            action: self.kind().as_str().to_string(),
            payload,
            speak: self.spoken_text().map(str::to_string),
        }
    }
}

/// Raw action as exchanged with the completion service and HTTP callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireAction {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speak: Option<String>,
}

impl WireAction {
    pub fn kind(&self) -> Result<ActionKind, ActionError> {
        self.action.parse()
    }

    /// A string field of the payload, ignoring blanks.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, field: &str) -> Result<&str, ActionError> {
        self.payload_str(field).ok_or_else(|| ActionError::MissingField {
            action: self.action.clone(),
            field: field.to_string(),
        })
    }

    pub fn speak_text(&self) -> Option<&str> {
        self.speak.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Parses completion output strictly: exactly one JSON object, nothing around it.
pub fn parse_wire(raw: &str) -> Result<WireAction, ActionError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let Value::Object(mut object) = value else {
        return Err(ActionError::NotAnObject);
    };

    let action = match object.remove("action") {
        Some(Value::String(action)) => action,
        _ => {
            return Err(ActionError::MissingField {
                action: "?".to_string(),
                field: "action".to_string(),
            });
        }
    };
    let payload = match object.remove("payload") {
        None | Some(Value::Null) => None,
        Some(payload @ Value::Object(_)) => Some(payload),
        Some(_) => return Err(ActionError::NotAnObject),
    };
    let speak = match object.remove("speak") {
        Some(Value::String(speak)) => Some(speak),
        _ => None,
    };

    let wire = WireAction {
        action,
        payload,
        speak,
    };
    wire.kind()?;
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
        assert!(matches!(
            "DANCE".parse::<ActionKind>(),
            Err(ActionError::UnknownAction(name)) if name == "DANCE"
        ));
    }

    #[test]
    fn parses_a_well_formed_reply() {
        let wire = parse_wire(
            r#" {"action":"CHANGE_STEP","payload":{"stepKey":"robotDocking"},"speak":"Moving on."} "#,
        )
        .unwrap();
        assert_eq!(wire.kind().unwrap(), ActionKind::ChangeStep);
        assert_eq!(wire.payload_str("stepKey"), Some("robotDocking"));
        assert_eq!(wire.speak_text(), Some("Moving on."));
    }

    #[test]
    fn rejects_prose_and_unknown_actions() {
        assert!(matches!(
            parse_wire("Sure! {\"action\":\"NONE\"}"),
            Err(ActionError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_wire("```json\n{\"action\":\"NONE\"}\n```"),
            Err(ActionError::InvalidJson(_))
        ));
        assert!(matches!(parse_wire("[1,2]"), Err(ActionError::NotAnObject)));
        assert!(matches!(
            parse_wire(r#"{"action":"DANCE"}"#),
            Err(ActionError::UnknownAction(_))
        ));
        assert!(matches!(
            parse_wire(r#"{"speak":"hi"}"#),
            Err(ActionError::MissingField { .. })
        ));
        assert!(matches!(
            parse_wire(r#"{"action":"LOG_NOTE","payload":"note"}"#),
            Err(ActionError::NotAnObject)
        ));
    }

    #[test]
    fn wire_shape_matches_fixtures() {
        let note = AssistantAction::LogNote {
            note: "User requested scalpel.".to_string(),
        };
        assert_eq!(
            serde_json::to_value(note.to_wire()).unwrap(),
            json!({"action": "LOG_NOTE", "payload": {"note": "User requested scalpel."}})
        );

        let none = serde_json::to_value(AssistantAction::none().to_wire()).unwrap();
        assert_eq!(none, json!({"action": "NONE"}));
    }

    #[test]
    fn silencing_keeps_transitions_but_drops_speech() {
        let change = AssistantAction::ChangeStep {
            step_key: "robotDocking".to_string(),
            speak: Some("Port Placement complete, starting Docking the robot.".to_string()),
        };
        let silenced = change.silenced();
        assert_eq!(silenced.kind(), ActionKind::ChangeStep);
        assert_eq!(silenced.spoken_text(), None);

        assert!(AssistantAction::speak("Hello").silenced().is_none());
    }
}
