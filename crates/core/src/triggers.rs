//! Deterministic utterance classifiers.
//!
//! Every function here takes text already passed through [`crate::text::normalize`] unless
//! it says otherwise, and none of them consult the completion service.

use crate::text::{contains_any, contains_phrase, find_phrase};
use crate::timefmt::parse_duration;

/// System trigger that opens a session.
pub const SESSION_START: &str = "SESSION_START";

pub const DEFAULT_WAKE_PHRASES: &[&str] = &["hey veritas", "hey rise", "okay veritas", "ok veritas"];

pub const DEFAULT_INSTRUMENTS: &[&str] = &[
    "scalpel",
    "grasper",
    "scissors",
    "suction",
    "irrigation",
    "needle driver",
    "suture",
    "forceps",
    "retractor",
    "cautery",
    "bovie",
    "sponge",
    "gauze",
    "lap pad",
    "hemostat",
    "clip applier",
    "stapler",
    "trocar",
    "camera",
    "hook",
];

const SILENCE: &[&str] = &[
    "shut up",
    "be quiet",
    "stop talking",
    "quiet please",
    "silence",
    "mute",
    "not now veritas",
    "stop listening",
];

const REQUEST_MARKERS: &[&str] = &[
    "please",
    "pass",
    "hand me",
    "give me",
    "get me",
    "can i get",
    "can i have",
    "could i get",
    "could i have",
    "i need",
    "i want",
    "lets get",
];

const REJECT: &[&str] = &[
    "no",
    "nope",
    "not yet",
    "negative",
    "cancel",
    "wrong",
    "not moving",
    "stay on",
    "staying on",
    "still on",
    "were still",
    "still doing",
    "hold on",
    "wait",
];

const AFFIRM: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "yup",
    "correct",
    "confirm",
    "confirmed",
    "affirmative",
    "thats right",
    "go ahead",
    "sounds good",
    "that is right",
    "we are",
    "ok",
    "okay",
    "sure",
];

const FINISHED: &[&str] = &[
    "done with",
    "finished with",
    "finished",
    "is complete",
    "is completed",
    "is done",
    "are done",
    "completed",
    "wrapped up",
];

const THIS_STEP: &[&str] = &["this step", "that step", "this part", "the current step"];

const STARTING: &[&str] = &[
    "moving on to",
    "move on to",
    "moving to",
    "on to the",
    "lets start",
    "lets begin",
    "starting the",
    "now starting",
    "were starting",
    "going to start",
    "time to start",
];

const NEXT_STEP: &[&str] = &[
    "next step",
    "moving on",
    "lets move on",
    "move on to the next",
    "on to the next",
];

const SESSION_SCOPE: &[&str] = &[
    "total",
    "overall",
    "in total",
    "altogether",
    "whole case",
    "the case",
    "whole procedure",
    "entire",
    "session",
    "since we started",
    "since the start",
];

const TIME_QUERY: &[&str] = &["how long", "how much time"];

// Phrasings that ask for the running clock on their own.
const ELAPSED_QUERY: &[&str] = &["elapsed time", "time elapsed", "whats the time on"];

// "How long" only asks about the clock when something is said to be underway.
const UNDERWAY: &[&str] = &[
    "have we been",
    "has it been",
    "been going",
    "been on",
    "been doing",
    "been at",
    "been in",
    "been running",
    "so far",
];

const ROLES: &[&str] = &["attending", "resident", "surgeon", "fellow"];

const NAME_STOPWORDS: &[&str] = &[
    "im", "i", "am", "the", "and", "a", "an", "dr", "doctor", "is", "this", "here", "your", "my",
    "attending", "resident", "surgeon", "fellow", "today", "pgy", "one", "two", "three", "four",
    "five",
];

pub fn is_session_start(raw: &str) -> bool {
    raw.trim() == SESSION_START
}

/// Whether the utterance addresses the assistant by a wake phrase or by name.
pub fn is_addressed<S: AsRef<str>>(normalized: &str, wake_phrases: &[S]) -> bool {
    wake_phrases
        .iter()
        .any(|phrase| contains_phrase(normalized, phrase.as_ref()))
        || normalized == "veritas"
        || normalized.starts_with("veritas ")
}

pub fn is_silence_command(normalized: &str) -> bool {
    contains_any(normalized, SILENCE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeScope {
    Step,
    Session,
}

/// Classifies "how long have we been ..." questions.
///
/// A bare "how long" ("how long is that trocar?") only counts when the
/// assistant is addressed.
pub fn time_query(normalized: &str, addressed: bool) -> Option<TimeScope> {
    let asks_clock = contains_any(normalized, ELAPSED_QUERY)
        || (contains_any(normalized, TIME_QUERY)
            && (addressed || contains_any(normalized, UNDERWAY)));
    if !asks_clock {
        return None;
    }
    if contains_any(normalized, SESSION_SCOPE) {
        Some(TimeScope::Session)
    } else {
        Some(TimeScope::Step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Attending,
    Resident,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Introduction {
    /// Role stated in the utterance, if any.
    pub role: Option<Role>,
    /// Surname, capitalized.
    pub name: Option<String>,
}

/// Detects a name/role introduction during the time-out.
///
/// Requires "my name is", a "Dr." form, or a first-person statement with a role
/// word so that ordinary talk about the team is not taken as an introduction.
pub fn introduction(normalized: &str) -> Option<Introduction> {
    // "Dr. Smith here" introduces; "the attending is here" only announces.
    let first_person = contains_any(normalized, &["im", "i am", "this is"])
        || (contains_any(normalized, &["dr", "doctor"]) && contains_phrase(normalized, "here"));
    let named = contains_phrase(normalized, "my name is");
    let doctor = contains_any(normalized, &["im dr", "i am dr", "this is dr", "im doctor"]);
    let has_role = contains_any(normalized, ROLES);

    if !(named || doctor || (first_person && has_role)) {
        return None;
    }

    let role = if contains_any(normalized, &["resident", "fellow"]) {
        Some(Role::Resident)
    } else if contains_phrase(normalized, "attending") {
        Some(Role::Attending)
    } else {
        None
    };

    Some(Introduction {
        role,
        name: extract_name(normalized),
    })
}

fn extract_name(normalized: &str) -> Option<String> {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let start = words
        .iter()
        .position(|w| *w == "dr" || *w == "doctor")
        .map(|i| i + 1)
        .or_else(|| {
            words
                .windows(3)
                .position(|w| w == ["my", "name", "is"])
                .map(|i| i + 3)
        })?;

    let name_words: Vec<&str> = words
        .get(start..)?
        .iter()
        .skip_while(|w| **w == "dr" || **w == "doctor")
        .take_while(|w| !NAME_STOPWORDS.contains(*w) && !w.chars().all(|c| c.is_ascii_digit()))
        .take(3)
        .copied()
        .collect();

    name_words.last().map(|surname| capitalize(surname))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether the reply turns down a proposed step change.
///
/// Checked before [`is_affirmation`] so "no, we are still dissecting" reverts.
pub fn is_rejection(normalized: &str) -> bool {
    contains_any(normalized, REJECT)
}

pub fn is_affirmation(normalized: &str) -> bool {
    contains_any(normalized, AFFIRM)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepIntent {
    /// A step (named, or "this step") was declared finished.
    Finished,
    /// A step was named as starting now.
    Starting,
    /// "Next step" with nothing named.
    Next,
}

/// Explicit statements about moving through the procedure.
///
/// `names_step` tells whether the utterance names any catalogue step; an
/// unnamed "finished" only counts when it refers to "this step".
pub fn step_intent(normalized: &str, names_step: bool) -> Option<StepIntent> {
    if contains_any(normalized, FINISHED) && (names_step || contains_any(normalized, THIS_STEP)) {
        return Some(StepIntent::Finished);
    }
    if names_step && contains_any(normalized, STARTING) {
        return Some(StepIntent::Starting);
    }
    if contains_any(normalized, NEXT_STEP) {
        return Some(StepIntent::Next);
    }
    None
}

/// Whether the utterance says something was finished, with or without naming it.
pub fn mentions_finishing(normalized: &str) -> bool {
    contains_any(normalized, FINISHED)
}

/// Seconds in a "... N minutes ago" correction, if the utterance states one.
pub fn correction_offset(normalized: &str) -> Option<u64> {
    if !contains_phrase(normalized, "ago") {
        return None;
    }
    parse_duration(normalized).filter(|secs| *secs > 0)
}

/// The instrument asked for in a request like "Scalpel, please."
pub fn instrument_request<'a, S: AsRef<str>>(
    normalized: &str,
    instruments: &'a [S],
) -> Option<&'a str> {
    if !contains_any(normalized, REQUEST_MARKERS) {
        return None;
    }
    instruments
        .iter()
        .map(|s| s.as_ref())
        .filter_map(|instrument| find_phrase(normalized, instrument).map(|pos| (pos, instrument)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, instrument)| instrument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize;

    fn n(raw: &str) -> String {
        normalize(raw)
    }

    #[test]
    fn wake_phrases_gate_addressing() {
        assert!(is_addressed(&n("Hey, Veritas. How long?"), DEFAULT_WAKE_PHRASES));
        assert!(is_addressed(&n("Hey RISE, what's your name?"), DEFAULT_WAKE_PHRASES));
        assert!(is_addressed(&n("Veritas, what time is it?"), DEFAULT_WAKE_PHRASES));
        assert!(!is_addressed(&n("Scalpel, please."), DEFAULT_WAKE_PHRASES));
        assert!(!is_addressed(&n("The veritas thing is on"), DEFAULT_WAKE_PHRASES));
    }

    #[test]
    fn session_start_must_be_exact() {
        assert!(is_session_start(" SESSION_START "));
        assert!(!is_session_start("session start"));
    }

    #[test]
    fn classifies_time_queries() {
        assert_eq!(
            time_query(&n("Hey, Veritas. How long have we been doing this port placement?"), true),
            Some(TimeScope::Step)
        );
        assert_eq!(
            time_query(&n("How long have we been going in total?"), false),
            Some(TimeScope::Session)
        );
        assert_eq!(
            time_query(&n("What's the time on this step?"), false),
            Some(TimeScope::Step)
        );
        assert_eq!(time_query(&n("Scalpel, please."), false), None);
    }

    #[test]
    fn how_long_shop_talk_is_not_a_time_query() {
        for line in [
            "How long should I cut the suture?",
            "How long is that trocar?",
            "Do you know how long the next case is?",
        ] {
            assert_eq!(time_query(&n(line), false), None, "for {line:?}");
        }
        assert_eq!(
            time_query(&n("Hey Veritas, how long?"), true),
            Some(TimeScope::Step)
        );
    }

    #[test]
    fn reads_introductions() {
        let intro = introduction(&n("I'm Dr. Smith, the attending surgeon.")).unwrap();
        assert_eq!(intro.role, Some(Role::Attending));
        assert_eq!(intro.name.as_deref(), Some("Smith"));

        let intro = introduction(&n("My name is Jane Doe, I'm the resident.")).unwrap();
        assert_eq!(intro.role, Some(Role::Resident));
        assert_eq!(intro.name.as_deref(), Some("Doe"));

        let intro = introduction(&n("This is Alex, PGY 4 resident")).unwrap();
        assert_eq!(intro.role, Some(Role::Resident));
        assert_eq!(intro.name, None);

        let intro = introduction(&n("Dr. Patel here, attending.")).unwrap();
        assert_eq!(intro.role, Some(Role::Attending));
        assert_eq!(intro.name.as_deref(), Some("Patel"));

        assert!(introduction(&n("The resident will close today.")).is_none());
        assert!(introduction(&n("The attending is here.")).is_none());
    }

    #[test]
    fn rejection_wins_over_affirmation() {
        let reply = n("No, we are still doing the ports.");
        assert!(is_rejection(&reply));
        assert!(is_affirmation(&reply));
        assert!(!is_rejection(&n("Yes, go ahead.")));
    }

    #[test]
    fn explicit_step_statements() {
        assert_eq!(
            step_intent(&n("We're done with port placement."), true),
            Some(StepIntent::Finished)
        );
        assert_eq!(
            step_intent(&n("Okay, this step is done."), false),
            Some(StepIntent::Finished)
        );
        assert_eq!(step_intent(&n("The coffee is done."), false), None);
        assert_eq!(
            step_intent(&n("Moving on to the clipping."), true),
            Some(StepIntent::Starting)
        );
        assert_eq!(
            step_intent(&n("Alright, next step."), false),
            Some(StepIntent::Next)
        );
    }

    #[test]
    fn corrections_need_an_offset() {
        assert_eq!(
            correction_offset(&n("We actually started docking 5 minutes ago.")),
            Some(300)
        );
        assert_eq!(correction_offset(&n("A while ago we docked.")), None);
        assert_eq!(correction_offset(&n("Five minutes left.")), None);
    }

    #[test]
    fn instrument_requests_need_a_request() {
        assert_eq!(
            instrument_request(&n("Scalpel, please."), DEFAULT_INSTRUMENTS),
            Some("scalpel")
        );
        assert_eq!(
            instrument_request(&n("Can I get the needle driver and suture?"), DEFAULT_INSTRUMENTS),
            Some("needle driver")
        );
        assert_eq!(
            instrument_request(&n("That scalpel is sharp."), DEFAULT_INSTRUMENTS),
            None
        );
    }

    #[test]
    fn silence_commands() {
        assert!(is_silence_command(&n("Veritas, shut up.")));
        assert!(is_silence_command(&n("Be quiet please")));
        assert!(!is_silence_command(&n("Quietly now, retract.")));
    }
}
