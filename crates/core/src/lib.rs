//! Decision core of the Veritas live session assistant.
//!
//! A session ingests transcript entries, decides on one [`action::AssistantAction`]
//! per finalized utterance, and folds it into [`state::SessionState`] through
//! [`reducer::apply`].

pub mod action;
pub mod catalogue;
pub mod completion;
pub mod engine;
pub mod error;
pub mod messages;
pub mod procedures;
pub mod prompt;
pub mod reducer;
pub mod session;
pub mod state;
pub mod template;
pub mod text;
pub mod timefmt;
pub mod transcript;
pub mod triggers;
pub mod validate;

/// Side effects a live session asks its runtime to perform.
///
/// Keeps decision-making apart from speech output and note storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Speak the given text in the room.
    SpeakText(String),
    /// Record a silent note, e.g. an instrument request.
    LogNote(String),
    /// The session has ended, with a closing summary.
    SessionComplete(String),
}
