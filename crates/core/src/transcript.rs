use serde::{Deserialize, Serialize};

/// Default number of finalized entries shown to the decision engine.
pub const DEFAULT_WINDOW: usize = 15;

/// One recognized utterance from the transcription adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub speaker: String,
    pub text: String,
    #[serde(default = "default_final")]
    pub is_final: bool,
}

fn default_final() -> bool {
    true
}

impl TranscriptEntry {
    pub fn final_from(speaker: &str, text: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            text: text.to_string(),
            is_final: true,
        }
    }

    pub fn interim_from(speaker: &str, text: &str) -> Self {
        Self {
            is_final: false,
            ..Self::final_from(speaker, text)
        }
    }

    /// The internal trigger that opens a session.
    pub fn session_start() -> Self {
        Self::final_from("system", crate::triggers::SESSION_START)
    }
}

/// Append-only transcript of a session.
///
/// Finalized entries never change once appended. Each speaker has at most one
/// interim entry, replaced by that speaker's next interim or final result.
#[derive(Debug, Clone)]
pub struct TranscriptBuffer {
    finals: Vec<TranscriptEntry>,
    interims: Vec<TranscriptEntry>,
    window: usize,
}

impl Default for TranscriptBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl TranscriptBuffer {
    pub fn new(window: usize) -> Self {
        Self {
            finals: Vec::new(),
            interims: Vec::new(),
            window: window.max(1),
        }
    }

    /// Appends an entry. Returns `true` when a finalized utterance was added.
    pub fn append(&mut self, entry: TranscriptEntry) -> bool {
        let text = entry.text.trim();
        if text.is_empty() {
            return false;
        }
        let entry = TranscriptEntry {
            text: text.to_string(),
            ..entry
        };

        self.interims.retain(|e| e.speaker != entry.speaker);
        if entry.is_final {
            self.finals.push(entry);
            true
        } else {
            self.interims.push(entry);
            false
        }
    }

    /// The last K finalized entries, oldest first.
    pub fn recent_window(&self) -> &[TranscriptEntry] {
        let start = self.finals.len().saturating_sub(self.window);
        self.finals.get(start..).unwrap_or_default()
    }

    pub fn latest_final(&self) -> Option<&TranscriptEntry> {
        self.finals.last()
    }

    pub fn final_count(&self) -> usize {
        self.finals.len()
    }

    pub fn interim(&self, speaker: &str) -> Option<&TranscriptEntry> {
        self.interims.iter().find(|e| e.speaker == speaker)
    }

    /// Recent window as `speaker: text` lines for prompting.
    pub fn recent_text(&self) -> String {
        render_lines(self.recent_window())
    }

    /// Every finalized utterance, for end-of-session analysis.
    pub fn full_text(&self) -> String {
        render_lines(&self.finals)
    }
}

pub fn render_lines(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.speaker, e.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_the_last_k_finals() {
        let mut buffer = TranscriptBuffer::new(3);
        for i in 0..5 {
            assert!(buffer.append(TranscriptEntry::final_from("attending", &format!("line {i}"))));
        }
        let texts: Vec<&str> = buffer.recent_window().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
        assert_eq!(buffer.full_text().lines().count(), 5);
        assert_eq!(buffer.recent_text(), "attending: line 2\nattending: line 3\nattending: line 4");
    }

    #[test]
    fn interim_entries_are_replaced_in_place() {
        let mut buffer = TranscriptBuffer::default();
        assert!(!buffer.append(TranscriptEntry::interim_from("resident", "can you")));
        assert!(!buffer.append(TranscriptEntry::interim_from("resident", "can you pass")));
        assert!(!buffer.append(TranscriptEntry::interim_from("attending", "okay")));
        assert_eq!(buffer.interim("resident").unwrap().text, "can you pass");
        assert_eq!(buffer.final_count(), 0);

        assert!(buffer.append(TranscriptEntry::final_from("resident", "Can you pass the grasper?")));
        assert!(buffer.interim("resident").is_none());
        assert_eq!(buffer.interim("attending").unwrap().text, "okay");
        assert_eq!(buffer.latest_final().unwrap().text, "Can you pass the grasper?");
    }

    #[test]
    fn blank_entries_are_ignored() {
        let mut buffer = TranscriptBuffer::default();
        assert!(!buffer.append(TranscriptEntry::final_from("attending", "   ")));
        assert_eq!(buffer.final_count(), 0);
        assert!(buffer.recent_window().is_empty());
    }

    #[test]
    fn entries_deserialize_as_final_by_default() {
        let entry: TranscriptEntry =
            serde_json::from_str(r#"{"speaker":"attending","text":"Scalpel, please."}"#).unwrap();
        assert!(entry.is_final);
    }
}
