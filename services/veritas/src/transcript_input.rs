//! Line format accepted on stdin by `veritas run`.
//!
//! `Speaker: text` is a finalized utterance, `~Speaker: text` an interim one,
//! and a bare `SESSION_START` line is the system trigger that opens the session.

use veritas_core::transcript::TranscriptEntry;
use veritas_core::triggers::is_session_start;

const INTERIM_MARKER: char = '~';
const UNKNOWN_SPEAKER: &str = "unknown";

/// Parses one input line. Blank lines and comments (`#`) yield `None`.
pub fn parse_line(line: &str) -> Option<TranscriptEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if is_session_start(line) {
        return Some(TranscriptEntry::session_start());
    }

    let (interim, rest) = match line.strip_prefix(INTERIM_MARKER) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line),
    };

    let (speaker, text) = match rest.split_once(':') {
        Some((speaker, text)) if is_speaker_label(speaker) => (speaker.trim(), text.trim()),
        _ => (UNKNOWN_SPEAKER, rest),
    };
    if text.is_empty() {
        return None;
    }

    Some(if interim {
        TranscriptEntry::interim_from(speaker, text)
    } else {
        TranscriptEntry::final_from(speaker, text)
    })
}

// A label is short and has no sentence punctuation, so "Note: the clip" style
// utterances without a speaker still parse sensibly.
fn is_speaker_label(label: &str) -> bool {
    let label = label.trim();
    !label.is_empty()
        && label.split_whitespace().count() <= 3
        && label
            .chars()
            .all(|c| c.is_alphanumeric() || c == ' ' || c == '.' || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_and_interim_lines() {
        assert_eq!(
            parse_line("Dr. Smith: Scalpel, please."),
            Some(TranscriptEntry::final_from("Dr. Smith", "Scalpel, please."))
        );
        assert_eq!(
            parse_line("~Resident: we're moving the"),
            Some(TranscriptEntry::interim_from("Resident", "we're moving the"))
        );
    }

    #[test]
    fn session_start_is_the_system_trigger() {
        assert_eq!(parse_line("  SESSION_START "), Some(TranscriptEntry::session_start()));
    }

    #[test]
    fn lines_without_a_label_use_an_unknown_speaker() {
        let entry = parse_line("Hey Veritas, what time is it?").unwrap();
        assert_eq!(entry.speaker, "unknown");
        assert_eq!(entry.text, "Hey Veritas, what time is it?");
        assert!(entry.is_final);

        let entry = parse_line("Okay, the clip goes here: right at the duct").unwrap();
        assert_eq!(entry.speaker, "unknown");
    }

    #[test]
    fn blank_comment_and_empty_utterances_are_skipped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# scripted case 3"), None);
        assert_eq!(parse_line("Attending:   "), None);
    }
}
