//! Shared fixtures for the session integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use url::Url;
use vireo_config::SessionConfig;
use vireo_model::{BackendConnection, BackendKind, PlaybackEvent, VideoId, VideoMeta};
use vireo_session::backend::BackendCore;
use vireo_session::{BackendError, BackendResult, PlaybackBackend};

/// A control call that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Play,
    Pause,
    Seek(f64),
}

/// Backend that records every call and lets the test decide when it is
/// ready and which calls fail.
#[derive(Debug)]
pub struct RecordingBackend {
    core: BackendCore,
    calls: Mutex<Vec<Call>>,
    play_failures: Mutex<VecDeque<BackendError>>,
    seek_failures: Mutex<VecDeque<BackendError>>,
    detached: AtomicBool,
}

impl RecordingBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            core: BackendCore::new(kind, 64),
            calls: Mutex::new(Vec::new()),
            play_failures: Mutex::new(VecDeque::new()),
            seek_failures: Mutex::new(VecDeque::new()),
            detached: AtomicBool::new(false),
        }
    }

    pub fn local() -> Arc<Self> {
        Arc::new(Self::new(BackendKind::Local))
    }

    pub fn fail_next_play(&self, err: BackendError) {
        self.play_failures.lock().push_back(err);
    }

    pub fn fail_next_seek(&self, err: BackendError) {
        self.seek_failures.lock().push_back(err);
    }

    /// Flip to ready and emit `Ready`; false when already ready.
    pub fn make_ready(&self) -> bool {
        self.core.mark_ready().is_some()
    }

    pub fn emit(&self, event: PlaybackEvent) {
        self.core.emit(event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Seek(to) => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn play_count(&self) -> usize {
        self.calls().iter().filter(|call| **call == Call::Play).count()
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PlaybackBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        self.core.kind()
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    async fn play(&self) -> BackendResult<()> {
        self.record(Call::Play);
        let failure = self.play_failures.lock().pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn pause(&self) -> BackendResult<()> {
        self.record(Call::Pause);
        Ok(())
    }

    async fn seek(&self, to_seconds: f64) -> BackendResult<()> {
        self.record(Call::Seek(to_seconds));
        let failure = self.seek_failures.lock().pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn current_time(&self) -> BackendResult<f64> {
        Ok(self.seeks().last().copied().unwrap_or(0.0))
    }

    async fn is_paused(&self) -> BackendResult<bool> {
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.core.subscribe()
    }

    async fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

pub fn video_id(raw: &str) -> VideoId {
    VideoId::new(raw).expect("valid video id")
}

pub fn local_video(id: &str, duration: f64) -> VideoMeta {
    let source = Url::parse(&format!("https://cdn.example.com/{id}.mp4")).expect("url");
    VideoMeta::new(video_id(id), duration, BackendConnection::Local { source })
        .expect("valid video")
}

pub fn remote_video(id: &str, duration: f64) -> VideoMeta {
    let embed_url = Url::parse(&format!("https://player.example.com/embed/{id}")).expect("url");
    VideoMeta::new(
        video_id(id),
        duration,
        BackendConnection::Remote {
            embed_url,
            player_id: None,
        },
    )
    .expect("valid video")
}

pub fn config() -> SessionConfig {
    SessionConfig::default()
}

/// Let spawned tasks run until they block. Meant for paused-clock tests,
/// where the sleep only completes once the runtime is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
