/// Events emitted by a playback backend.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "event", rename_all = "snake_case")
)]
pub enum PlaybackEvent {
    Ready,
    Play,
    Pause,
    #[cfg_attr(feature = "serde", serde(rename = "timeupdate"))]
    TimeUpdate {
        seconds: f64,
    },
    Ended,
    Error {
        fatal: bool,
    },
}

impl PlaybackEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::Ready => "ready",
            PlaybackEvent::Play => "play",
            PlaybackEvent::Pause => "pause",
            PlaybackEvent::TimeUpdate { .. } => "timeupdate",
            PlaybackEvent::Ended => "ended",
            PlaybackEvent::Error { .. } => "error",
        }
    }
}
