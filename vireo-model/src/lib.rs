//! Core data model definitions shared across Vireo crates.
#![allow(missing_docs)]

pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod progress;
pub mod transcript;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use events::PlaybackEvent;
pub use ids::{SessionId, VideoId};
pub use media::{BackendConnection, BackendKind, MediaSession, VideoMeta};
pub use progress::{ProgressUpdate, SavedProgress};
pub use transcript::{RawTranscript, TranscriptSegment, format_display_time};
