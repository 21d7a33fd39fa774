use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// A chapter boundary parsed from a video description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub title: String,
    pub timestamp: String,
    pub seconds: u32,
}

// A label followed by MM:SS or HH:MM:SS at the start of a line
static MARKER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([^:\n]+?)\s*(\d+:\d+(?::\d+)?)").unwrap());

static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\d+$").unwrap());

/// Parse chapter markers from a description, in order of appearance
pub fn parse_markers(description: &str) -> Vec<Marker> {
    MARKER_LINE
        .captures_iter(description)
        .map(|caps| {
            let label = caps[1].trim();
            let title = TRAILING_NUMBER.replace(label, "").into_owned();
            let timestamp = caps[2].to_string();
            let seconds = timestamp_to_seconds(&timestamp);
            Marker {
                title,
                timestamp,
                seconds,
            }
        })
        .collect()
}

/// Convert `MM:SS` or `HH:MM:SS` to seconds; anything else is 0
pub fn timestamp_to_seconds(timestamp: &str) -> u32 {
    let parts: Vec<u32> = timestamp
        .split(':')
        .map(|p| p.parse::<u32>().unwrap_or(0))
        .collect();

    match parts.as_slice() {
        [m, s] => m.saturating_mul(60).saturating_add(*s),
        [h, m, s] => h
            .saturating_mul(3600)
            .saturating_add(m.saturating_mul(60))
            .saturating_add(*s),
        _ => 0,
    }
}
