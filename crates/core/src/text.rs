//! Utterance normalization helpers used by the catalogue and the trigger rules.

/// Lowercases, replaces punctuation with spaces and collapses whitespace.
///
/// `"Hey, Veritas. How long?"` becomes `"hey veritas how long"`.
pub fn normalize(text: &str) -> String {
    let lowered: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else if c == '\'' || c == '\u{2019}' {
                // Keep contractions together: "we're" -> "were".
                '\u{0}'
            } else {
                ' '
            }
        })
        .filter(|c| *c != '\u{0}')
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase alphanumerics only, used for key/name equality.
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Splits a camelCase key into words: `"robotDocking"` -> `"robot docking"`.
pub fn split_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push(' ');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Byte offset of `phrase` in already-normalized `text`, on word boundaries.
pub fn find_phrase(text: &str, phrase: &str) -> Option<usize> {
    let phrase = normalize(phrase);
    if phrase.is_empty() {
        return None;
    }
    let haystack = format!(" {text} ");
    haystack.find(&format!(" {phrase} "))
}

/// Whether already-normalized `text` contains `phrase` as whole words.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    find_phrase(text, phrase).is_some()
}

/// Whether already-normalized `text` contains any of `phrases` as whole words.
pub fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(text, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize("Hey, Veritas. How long have we been doing this?"),
            "hey veritas how long have we been doing this"
        );
        assert_eq!(normalize("  We're   done!  "), "were done");
    }

    #[test]
    fn phrases_match_on_word_boundaries() {
        let text = normalize("Can you drive the robot here now?");
        assert!(contains_phrase(&text, "robot"));
        assert!(contains_phrase(&text, "drive the robot"));
        assert!(!contains_phrase(&text, "rob"));
        assert!(contains_any(&text, &["scalpel", "the robot"]));
    }

    #[test]
    fn camel_keys_split_into_words() {
        assert_eq!(split_camel("portPlacement"), "port placement");
        assert_eq!(compact("Port Placement"), "portplacement");
    }
}
