use thiserror::Error;
use vireo_model::BackendKind;

/// Failure of a playback command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("backend is not ready")]
    NotReady,

    /// Automatic playback was refused; a user gesture is needed.
    #[error("playback was blocked by the player")]
    PlaybackBlocked,

    #[error("command rejected: {0}")]
    Rejected(String),

    #[error("backend disconnected")]
    Disconnected,

    #[error("timed out waiting for a reply from the remote player")]
    ReplyTimeout,

    #[error("fatal backend failure: {0}")]
    Fatal(String),
}

impl BackendError {
    /// Fatal errors need a reload; everything else has a fallback path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::Fatal(_))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Failure talking to the watch-progress store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("progress request failed: {0}")]
    Request(#[from] anyhow::Error),

    #[error("progress store is unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("video expects a {expected} backend but a {actual} backend was supplied")]
    BackendMismatch {
        expected: BackendKind,
        actual: BackendKind,
    },

    #[error("session is closed")]
    Closed,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type SessionResult<T> = Result<T, SessionError>;
