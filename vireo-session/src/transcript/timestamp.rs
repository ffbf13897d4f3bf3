use once_cell::sync::Lazy;
use regex::Regex;

static CUE_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})(?:[.,](\d{1,3}))?$")
        .expect("cue timestamp pattern")
});

static INLINE_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\[(]?\b(?:(\d{1,2}):)?(\d{1,2}):([0-5]\d)\b[\])]?")
        .expect("inline timestamp pattern")
});

/// Parse a cue timestamp (`H:MM:SS.mmm`, `MM:SS.mmm`, `,` or `.` before the
/// milliseconds) into seconds.
pub fn parse_cue_timestamp(raw: &str) -> Option<f64> {
    let caps = CUE_TIMESTAMP.captures(raw.trim())?;

    let hours: u64 = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(3)?.as_str().parse().ok()?;
    if seconds >= 60 || (caps.get(1).is_some() && minutes >= 60) {
        return None;
    }

    let millis = match caps.get(4) {
        Some(m) => {
            let digits = m.as_str();
            // "5" is 500ms, "05" is 50ms
            let value: u64 = digits.parse().ok()?;
            value * 10u64.pow(3 - digits.len() as u32)
        }
        None => 0,
    };

    // An absurd hour field is malformed, not a wrap-around.
    let total_millis = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?
        .checked_mul(1000)?
        .checked_add(millis)?;
    Some(total_millis as f64 / 1000.0)
}

/// Find an embedded `M:SS` or `H:MM:SS` token in a line of text.
///
/// Returns the position in seconds and the line with the token (plus any
/// surrounding brackets and separator punctuation) removed.
pub fn extract_inline_timestamp(line: &str) -> Option<(f64, String)> {
    let caps = INLINE_TIMESTAMP.captures(line)?;
    let whole = caps.get(0)?;

    let hours: u64 = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(3)?.as_str().parse().ok()?;
    if caps.get(1).is_some() && minutes >= 60 {
        return None;
    }

    let before = line[..whole.start()].trim_end();
    let after = line[whole.end()..]
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '|' | '.'));

    let rest = match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (false, true) => before.to_string(),
        (false, false) => format!("{before} {after}"),
    };

    Some(((hours * 3600 + minutes * 60 + seconds) as f64, rest))
}
