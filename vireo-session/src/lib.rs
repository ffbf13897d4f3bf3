//! # Vireo Session
//!
//! Reusable playback session for a single mounted video view.
//!
//! ## Overview
//!
//! A [`PlaybackSession`] sits between a playback engine and the view that
//! shows it:
//!
//! - **Backends**: one [`PlaybackBackend`] surface over a locally owned media
//!   element ([`LocalBackend`]) and an embedded player reached only through
//!   messages ([`RemoteBridgeBackend`])
//! - **Resume**: [`ResumeCoordinator`] seeks to the saved position and plays
//!   exactly once, whichever of backend readiness and the progress fetch
//!   arrives first
//! - **Transcripts**: cue and timestamped-line parsing, locale selection and
//!   the position-to-segment index that drives captions and auto-scroll
//! - **Progress**: rate-limited, best-effort saving through a
//!   [`ProgressStore`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vireo_config::SessionConfig;
//! use vireo_model::{BackendConnection, VideoId, VideoMeta};
//! use vireo_session::{
//!     LocalBackend, MemoryProgressStore, PlaybackSession, SessionDeps, SimulatedMedia,
//!     TranscriptResolver,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SessionConfig::default();
//! let meta = VideoMeta::new(
//!     VideoId::new("intro")?,
//!     600.0,
//!     BackendConnection::Local { source: "file:///videos/intro.mp4".parse()? },
//! )?;
//!
//! let backend = Arc::new(LocalBackend::from_config(
//!     Arc::new(SimulatedMedia::new(600.0)),
//!     &config,
//! ));
//! let deps = SessionDeps {
//!     store: Arc::new(MemoryProgressStore::new()),
//!     transcripts: TranscriptResolver::new(&config.transcript),
//!     scroller: None,
//! };
//!
//! let session = PlaybackSession::start(meta, backend, deps, &config, "en")?;
//! session.pause().await?;
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod active_segment;
pub mod api_client;
pub mod backend;
pub mod error;
pub mod progress;
pub mod resume;
pub mod scroll;
pub mod session;
pub mod sync;
pub mod transcript;

pub use active_segment::{ActiveChange, ActiveSegmentIndex};
pub use api_client::ApiClient;
pub use backend::{
    BridgeCommand, BridgeMessage, ChannelPeer, LocalBackend, MediaElement, PlaybackBackend,
    RemoteBridgeBackend, SimulatedMedia, channel_bridge, spawn_json_lines_bridge,
};
pub use error::{BackendError, BackendResult, SessionError, SessionResult, StoreError};
pub use progress::{HttpProgressStore, MemoryProgressStore, ProgressPersistence, ProgressStore};
pub use resume::{ResumeCoordinator, ResumeDecision, ResumeOutcome, ResumeState};
pub use scroll::{ScrollMetrics, ScrollScheduler, SegmentScroller, scroll_target};
pub use session::{PlaybackSession, SessionDeps, SessionSlot, SessionState};
pub use transcript::{
    ResolvedTranscript, TranscriptFetcher, TranscriptOrigin, TranscriptParser, TranscriptResolver,
};
