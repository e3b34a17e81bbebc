//! Output format implementations

use serde::Serialize;

use super::HistoryEntry;

/// JSON line structure
#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    timestamp: String,
    emotion: &'a str,
    source: &'a str,
}

/// Format as plain text, optionally prefixed with the local time
pub fn format_text(entry: &HistoryEntry, with_timestamp: bool) -> String {
    if with_timestamp {
        format!(
            "[{}] {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.source,
            entry.label
        )
    } else {
        format!("{}: {}", entry.source, entry.label)
    }
}

/// Format as one JSON line
pub fn format_json(entry: &HistoryEntry) -> String {
    let output = JsonOutput {
        timestamp: entry.timestamp.to_rfc3339(),
        emotion: entry.label.as_str(),
        source: &entry.source,
    };

    serde_json::to_string(&output)
        .unwrap_or_else(|_| format!("{{\"emotion\": \"{}\"}}", entry.label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EmotionLabel;
    use chrono::{Local, TimeZone};

    fn make_entry() -> HistoryEntry {
        HistoryEntry {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            label: EmotionLabel::new("happy"),
            source: "microphone".to_string(),
        }
    }

    #[test]
    fn test_format_text() {
        let entry = make_entry();
        assert_eq!(format_text(&entry, false), "microphone: happy");
        assert_eq!(
            format_text(&entry, true),
            "[2024-03-09 14:05:07] microphone: happy"
        );
    }

    #[test]
    fn test_format_json() {
        let formatted = format_json(&make_entry());
        assert!(formatted.contains("\"emotion\":\"happy\""));
        assert!(formatted.contains("\"source\":\"microphone\""));
        assert!(formatted.contains("\"timestamp\":\"2024-03-09T14:05:07"));
    }
}
