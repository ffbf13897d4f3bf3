use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use vireo_config::TranscriptSettings;
use vireo_model::{RawTranscript, TranscriptSegment};

use super::timestamp::{extract_inline_timestamp, parse_cue_timestamp};

static MARKUP_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("markup tag pattern"));

static OVERRIDE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\\[^}]*\}").expect("override block pattern"));

const DEFAULT_MERGE_THRESHOLD: usize = 200;

/// Turns raw transcript payloads into ordered, time-ranged segments.
///
/// Parsing never fails. Input that cannot be understood produces an empty
/// list, and callers fall back to showing the raw text.
#[derive(Debug, Clone)]
pub struct TranscriptParser {
    merge_threshold_chars: usize,
}

impl Default for TranscriptParser {
    fn default() -> Self {
        Self::new(DEFAULT_MERGE_THRESHOLD)
    }
}

impl TranscriptParser {
    pub fn new(merge_threshold_chars: usize) -> Self {
        Self {
            merge_threshold_chars: merge_threshold_chars.max(1),
        }
    }

    pub fn from_settings(settings: &TranscriptSettings) -> Self {
        Self::new(settings.merge_threshold_chars)
    }

    pub fn parse(&self, raw: &RawTranscript, duration: f64) -> Vec<TranscriptSegment> {
        match raw {
            RawTranscript::Text(text) => self.parse_text(text, duration),
            RawTranscript::Tokens(tokens) => {
                single_segment(tokens.iter().map(String::as_str), duration)
            }
        }
    }

    pub fn parse_text(&self, text: &str, duration: f64) -> Vec<TranscriptSegment> {
        let duration = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        let text = text.trim_start_matches('\u{feff}');
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut segments = if text.contains("-->") {
            let cues = parse_cues(text);
            debug!("[Transcript] Parsed {} structured cues", cues.len());
            cues
        } else if let Some(tokens) = json_tokens(text) {
            debug!("[Transcript] Joining {} word tokens", tokens.len());
            single_segment(tokens.iter().map(String::as_str), duration)
        } else {
            let segments = self.parse_lines(text, duration);
            debug!("[Transcript] Built {} segments from plain lines", segments.len());
            segments
        };

        // Stable: equal starts keep input order.
        segments.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
        segments
    }

    fn parse_lines(&self, text: &str, duration: f64) -> Vec<TranscriptSegment> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            return Vec::new();
        }
        let per_line = duration / lines.len() as f64;

        let mut drafts: Vec<Draft> = Vec::new();
        for line in lines {
            if let Some((start, rest)) = extract_inline_timestamp(line) {
                drafts.push(Draft::new(start, clean_markup(&rest)));
                continue;
            }

            let cleaned = clean_markup(line);
            match drafts.last_mut() {
                Some(previous)
                    if previous.text.chars().count() < self.merge_threshold_chars =>
                {
                    previous.append(&cleaned);
                }
                Some(previous) => {
                    let start = previous.estimated_end(per_line);
                    drafts.push(Draft::new(start, cleaned));
                }
                None => drafts.push(Draft::new(0.0, cleaned)),
            }
        }

        drafts.retain(|draft| !draft.text.is_empty());
        drafts.sort_by(|a, b| a.start.total_cmp(&b.start));

        let starts: Vec<f64> = drafts.iter().map(|draft| draft.start).collect();
        drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                let end = match starts.get(index + 1) {
                    Some(next) => *next,
                    None => duration.max(draft.start),
                };
                TranscriptSegment::new(draft.start, end, draft.text)
            })
            .collect()
    }
}

/// Untimed text accumulated for one heuristic segment.
struct Draft {
    start: f64,
    text: String,
    lines: usize,
}

impl Draft {
    fn new(start: f64, text: String) -> Self {
        Self {
            start,
            text,
            lines: 1,
        }
    }

    fn append(&mut self, line: &str) {
        if !line.is_empty() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            self.text.push_str(line);
        }
        self.lines += 1;
    }

    fn estimated_end(&self, per_line: f64) -> f64 {
        self.start + per_line * self.lines as f64
    }
}

enum Cursor {
    Outside,
    InCue {
        start: f64,
        end: f64,
        lines: Vec<String>,
    },
    Dropping,
}

fn parse_cues(text: &str) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut cursor = Cursor::Outside;

    for line in text.lines() {
        let line = line.trim();

        if line.contains("-->") {
            flush_cue(&mut cursor, &mut segments);
            cursor = match parse_timing_line(line) {
                Some((start, end)) => Cursor::InCue {
                    start,
                    end,
                    lines: Vec::new(),
                },
                None => {
                    debug!("[Transcript] Dropping cue with bad timing: {line}");
                    Cursor::Dropping
                }
            };
            continue;
        }

        if line.is_empty() {
            flush_cue(&mut cursor, &mut segments);
            continue;
        }

        // Header, cue identifiers and NOTE/STYLE blocks sit outside cues.
        if let Cursor::InCue { lines, .. } = &mut cursor {
            lines.push(line.to_string());
        }
    }
    flush_cue(&mut cursor, &mut segments);

    segments
}

fn flush_cue(cursor: &mut Cursor, segments: &mut Vec<TranscriptSegment>) {
    if let Cursor::InCue { start, end, lines } = std::mem::replace(cursor, Cursor::Outside) {
        let text = clean_markup(&lines.join(" "));
        segments.push(TranscriptSegment::new(start, end, text));
    }
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (left, right) = line.split_once("-->")?;
    let start = parse_cue_timestamp(left)?;
    // Cue settings (`align:start line:90%`) follow the end time.
    let end = parse_cue_timestamp(right.split_whitespace().next()?)?;
    if end < start {
        return None;
    }
    Some((start, end))
}

/// Word tokens when the text is a JSON array of strings or of
/// `{"text": ..}` / `{"word": ..}` objects.
fn json_tokens(text: &str) -> Option<Vec<String>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) else {
        return None;
    };

    let tokens = items
        .iter()
        .filter_map(|item| match item {
            Value::String(token) => Some(token.clone()),
            Value::Object(fields) => fields
                .get("text")
                .or_else(|| fields.get("word"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect();
    Some(tokens)
}

fn single_segment<'a>(
    tokens: impl Iterator<Item = &'a str>,
    duration: f64,
) -> Vec<TranscriptSegment> {
    let joined = tokens
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let text = clean_markup(&joined);
    if text.is_empty() {
        return Vec::new();
    }
    let duration = if duration.is_finite() {
        duration.max(0.0)
    } else {
        0.0
    };
    vec![TranscriptSegment::new(0.0, duration, text)]
}

/// Strip inline tags and override blocks, decode common entities and
/// collapse whitespace.
pub fn clean_markup(text: &str) -> String {
    let without_tags = MARKUP_TAG.replace_all(text, "");
    let without_overrides = OVERRIDE_BLOCK.replace_all(&without_tags, "");
    let decoded = without_overrides
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
