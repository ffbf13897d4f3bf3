/// A single time-ranged transcript entry.
///
/// Lists of segments are kept ordered by non-decreasing `start_seconds`, every
/// segment satisfies `end_seconds >= start_seconds`, and at most one segment
/// in a list is active at a time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TranscriptSegment {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub display_time: String,
    pub text: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_active: bool,
}

impl TranscriptSegment {
    pub fn new(start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        let end_seconds = end_seconds.max(start_seconds);
        Self {
            start_seconds,
            end_seconds,
            display_time: format_display_time(start_seconds),
            text: text.into(),
            is_active: false,
        }
    }

    /// Half-open containment: `start <= position < end`.
    pub fn contains(&self, position: f64) -> bool {
        self.start_seconds <= position && position < self.end_seconds
    }

    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Transcript payload as embedded in video metadata or returned by the
/// transcript endpoint: either free text or word-level tokens.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawTranscript {
    Text(String),
    Tokens(Vec<String>),
}

impl RawTranscript {
    /// The payload as plain text, tokens joined by spaces.
    pub fn as_text(&self) -> String {
        match self {
            RawTranscript::Text(text) => text.clone(),
            RawTranscript::Tokens(tokens) => tokens.join(" "),
        }
    }
}

impl From<&str> for RawTranscript {
    fn from(value: &str) -> Self {
        RawTranscript::Text(value.to_string())
    }
}

impl From<String> for RawTranscript {
    fn from(value: String) -> Self {
        RawTranscript::Text(value)
    }
}

/// Format a position as `M:SS`, or `H:MM:SS` from one hour on.
pub fn format_display_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tokens_read_as_text() {
        let raw = RawTranscript::Tokens(vec!["hello".into(), "world".into()]);
        assert_eq!(raw.as_text(), "hello world");
        assert_eq!(RawTranscript::from("as is").as_text(), "as is");
    }

    #[test]
    fn display_time_switches_to_hours() {
        assert_eq!(format_display_time(0.0), "0:00");
        assert_eq!(format_display_time(65.9), "1:05");
        assert_eq!(format_display_time(3725.0), "1:02:05");
        assert_eq!(format_display_time(f64::NAN), "0:00");
    }

    #[test]
    fn containment_is_half_open() {
        let segment = TranscriptSegment::new(1.0, 2.0, "hi");
        assert!(segment.contains(1.0));
        assert!(segment.contains(1.999));
        assert!(!segment.contains(2.0));
    }

    #[test]
    fn end_never_precedes_start() {
        let segment = TranscriptSegment::new(5.0, 3.0, "odd");
        assert_eq!(segment.end_seconds, 5.0);
        assert_eq!(segment.duration(), 0.0);
    }
}
