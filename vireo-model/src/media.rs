use std::collections::HashMap;

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::ModelError;
use crate::ids::{SessionId, VideoId};
use crate::transcript::RawTranscript;

/// Which kind of playback engine drives a video view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BackendKind {
    /// A media resource owned by this process, controlled synchronously.
    Local,
    /// A player embedded in a sandboxed surface, reached by messages only.
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

/// Connection parameters for a video's backend.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum BackendConnection {
    Local {
        source: Url,
    },
    Remote {
        embed_url: Url,
        #[cfg_attr(feature = "serde", serde(default))]
        player_id: Option<String>,
    },
}

impl BackendConnection {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConnection::Local { .. } => BackendKind::Local,
            BackendConnection::Remote { .. } => BackendKind::Remote,
        }
    }
}

/// Video metadata supplied by the catalog when a view mounts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoMeta {
    pub id: VideoId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: Option<String>,
    pub duration_seconds: f64,
    pub backend: BackendConnection,
    /// Embedded transcripts keyed by locale tag (`en`, `pt-BR`, ...).
    #[cfg_attr(feature = "serde", serde(default))]
    pub transcripts: HashMap<String, RawTranscript>,
}

impl VideoMeta {
    pub fn new(
        id: VideoId,
        duration_seconds: f64,
        backend: BackendConnection,
    ) -> Result<Self, ModelError> {
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(ModelError::InvalidDuration(duration_seconds));
        }
        Ok(Self {
            id,
            title: None,
            duration_seconds,
            backend,
            transcripts: HashMap::new(),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_transcript(
        mut self,
        locale: impl Into<String>,
        transcript: RawTranscript,
    ) -> Self {
        self.transcripts.insert(locale.into(), transcript);
        self
    }
}

/// One playback session for one mounted video view.
///
/// Replaced wholesale when the user navigates to another video. The live
/// playback state is not stored here: `vireo_session::PlaybackSession`
/// publishes it as a `SessionState` through `watch_state()`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaSession {
    pub session_id: SessionId,
    pub video_id: VideoId,
    pub duration_seconds: f64,
    pub backend_kind: BackendKind,
    pub opened_at: DateTime<Utc>,
}

impl MediaSession {
    pub fn open(meta: &VideoMeta) -> Self {
        Self {
            session_id: SessionId::new(),
            video_id: meta.id.clone(),
            duration_seconds: meta.duration_seconds,
            backend_kind: meta.backend.kind(),
            opened_at: Utc::now(),
        }
    }
}
