//! Transcript parsing and per-session transcript selection.

pub mod parser;
pub mod source;
pub mod timestamp;

pub use parser::{TranscriptParser, clean_markup};
pub use source::{ResolvedTranscript, TranscriptFetcher, TranscriptOrigin, TranscriptResolver};
