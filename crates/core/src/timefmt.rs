//! Spoken durations: rendering session time and reading "N minutes ago".

use crate::text::normalize;

fn unit(count: u64, singular: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {singular}s")
    }
}

/// Renders seconds the way the assistant says them: `501` -> "8 minutes and 21 seconds".
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(unit(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(unit(minutes, "minute"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(unit(seconds, "second"));
    }

    match parts.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
        None => unit(0, "second"),
    }
}

/// Rounded description used in back-fill payloads: `300` -> "approximately 5 minutes".
pub fn describe_ago(seconds: u64) -> String {
    if seconds < 60 {
        return format!("approximately {}", unit(seconds, "second"));
    }
    let minutes = (seconds + 30) / 60;
    format!("approximately {}", unit(minutes, "minute"))
}

fn number_word(word: &str) -> Option<u64> {
    let value = match word {
        "a" | "an" | "one" => 1,
        "two" | "couple" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        _ => return word.parse().ok(),
    };
    Some(value)
}

fn unit_seconds(word: &str) -> Option<u64> {
    match word {
        "hour" | "hours" | "hr" | "hrs" => Some(3600),
        "minute" | "minutes" | "min" | "mins" => Some(60),
        "second" | "seconds" | "sec" | "secs" => Some(1),
        _ => None,
    }
}

/// Sums every `<number> <unit>` pair in free text.
///
/// Understands digits, number words ("twenty five"), "a"/"an", "a couple of",
/// and "half an hour". Returns `None` when no duration is stated or the
/// stated total does not fit in a `u64`.
pub fn parse_duration(text: &str) -> Option<u64> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let mut total = 0u64;
    let mut found = false;
    let mut pending: Option<u64> = None;

    let mut i = 0;
    while let Some(word) = words.get(i).copied() {
        if word == "half" && words.get(i + 1..i + 3) == Some(&["an", "hour"][..]) {
            total = total.checked_add(1800)?;
            found = true;
            pending = None;
            i += 3;
            continue;
        }
        if let Some(per_unit) = unit_seconds(word) {
            if let Some(count) = pending.take() {
                total = count
                    .checked_mul(per_unit)
                    .and_then(|secs| total.checked_add(secs))?;
                found = true;
            }
        } else if let Some(n) = number_word(word) {
            // "twenty five" accumulates; "couple of" keeps its value across "of".
            pending = Some(match pending {
                Some(tens) if (20..100).contains(&tens) && tens % 10 == 0 && n < 10 => tens + n,
                _ => n,
            });
        } else if word != "of" && word != "and" {
            pending = None;
        }
        i += 1;
    }

    found.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_spoken_durations() {
        assert_eq!(format_duration(501), "8 minutes and 21 seconds");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(3723), "1 hour, 2 minutes and 3 seconds");
        assert_eq!(format_duration(7200), "2 hours");
    }

    #[test]
    fn parses_stated_durations() {
        assert_eq!(parse_duration("about 5 minutes ago"), Some(300));
        assert_eq!(parse_duration("five minutes ago"), Some(300));
        assert_eq!(parse_duration("a minute and 30 seconds ago"), Some(90));
        assert_eq!(parse_duration("twenty five mins ago"), Some(1500));
        assert_eq!(parse_duration("half an hour ago"), Some(1800));
        assert_eq!(parse_duration("a couple of minutes ago"), Some(120));
        assert_eq!(parse_duration("approximately 5 minutes"), Some(300));
        assert_eq!(parse_duration("a while ago"), None);
        assert_eq!(parse_duration("minutes"), None);
    }

    #[test]
    fn oversized_durations_are_not_durations() {
        assert_eq!(parse_duration("9999999999999999999 hours ago"), None);
        assert_eq!(parse_duration("18446744073709551615 seconds and 5 seconds"), None);
        assert_eq!(parse_duration("18446744073709551610 5 minutes"), Some(300));
    }

    #[test]
    fn describes_backfill_offsets() {
        assert_eq!(describe_ago(300), "approximately 5 minutes");
        assert_eq!(describe_ago(330), "approximately 6 minutes");
        assert_eq!(describe_ago(45), "approximately 45 seconds");
        assert_eq!(describe_ago(60), "approximately 1 minute");
    }
}
