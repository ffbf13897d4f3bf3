//! One playback session per mounted video view.
//!
//! A [`PlaybackSession`] wires the backend's event stream into the resume
//! coordinator, the active-segment index and progress persistence, and owns
//! every task and timer those need. Everything hangs off one cancellation
//! token, so tearing the session down (or replacing it through a
//! [`SessionSlot`]) silences all of it at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vireo_config::SessionConfig;
use vireo_model::{MediaSession, PlaybackEvent, TranscriptSegment, VideoMeta};

use crate::active_segment::ActiveSegmentIndex;
use crate::backend::PlaybackBackend;
use crate::error::{SessionError, SessionResult};
use crate::progress::{ProgressPersistence, ProgressStore};
use crate::resume::{ResumeCoordinator, ResumeOutcome, ResumeState};
use crate::scroll::{ScrollScheduler, SegmentScroller};
use crate::transcript::{ResolvedTranscript, TranscriptResolver};

/// What the view shows for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    Playing,
    Paused,
    AwaitingUserAction,
    Ended,
    /// The backend failed fatally; offer a reload.
    ReloadRequired,
    Closed,
}

/// Collaborators supplied by the embedding surface.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn ProgressStore>,
    pub transcripts: TranscriptResolver,
    pub scroller: Option<Arc<dyn SegmentScroller>>,
}

impl std::fmt::Debug for SessionDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDeps")
            .field("transcripts", &self.transcripts)
            .field("has_scroller", &self.scroller.is_some())
            .finish()
    }
}

/// Shared pieces the background tasks work on.
struct Shared {
    media: MediaSession,
    backend: Arc<dyn PlaybackBackend>,
    coordinator: Arc<ResumeCoordinator>,
    persistence: ProgressPersistence,
    index: Mutex<ActiveSegmentIndex>,
    scroll: Option<ScrollScheduler>,
    state: watch::Sender<SessionState>,
    caption: watch::Sender<Option<String>>,
    transcript: watch::Sender<Option<ResolvedTranscript>>,
}

pub struct PlaybackSession {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("session_id", &self.shared.media.session_id)
            .field("video_id", &self.shared.media.video_id)
            .field("state", &*self.shared.state.borrow())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl PlaybackSession {
    /// Open a session for `meta` on `backend` and start its background work:
    /// the progress fetch, transcript resolution, the backend event pump and
    /// the resume coordinator.
    pub fn start(
        meta: VideoMeta,
        backend: Arc<dyn PlaybackBackend>,
        deps: SessionDeps,
        config: &SessionConfig,
        locale: &str,
    ) -> SessionResult<Self> {
        let expected = meta.backend.kind();
        if backend.kind() != expected {
            return Err(SessionError::BackendMismatch {
                expected,
                actual: backend.kind(),
            });
        }

        let media = MediaSession::open(&meta);
        let cancel = CancellationToken::new();
        info!(
            "[Session {}] Opening {} ({:.1}s, {} backend)",
            media.session_id.short(),
            media.video_id,
            media.duration_seconds,
            media.backend_kind
        );

        let coordinator = Arc::new(ResumeCoordinator::new(
            Arc::clone(&backend),
            meta.duration_seconds,
            config.resume.clone(),
        ));
        let persistence = ProgressPersistence::new(
            meta.id.clone(),
            meta.duration_seconds,
            config.persistence.clone(),
            Arc::clone(&deps.store),
            &cancel,
        );
        let scroll = deps
            .scroller
            .clone()
            .map(|scroller| ScrollScheduler::new(scroller, config.view.scroll_settle(), &cancel));

        let (state, _) = watch::channel(SessionState::Loading);
        let (caption, _) = watch::channel(None);
        let (transcript, _) = watch::channel(None);

        let shared = Arc::new(Shared {
            media,
            backend: Arc::clone(&backend),
            coordinator,
            persistence,
            index: Mutex::new(ActiveSegmentIndex::default()),
            scroll,
            state,
            caption,
            transcript,
        });

        // Subscribe before anything can emit so no early event is lost.
        let events = backend.subscribe();

        let mut tasks = Vec::with_capacity(4);
        tasks.push(tokio::spawn(pump_events(
            Arc::clone(&shared),
            events,
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(load_progress(
            Arc::clone(&shared),
            deps.store,
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(load_transcript(
            Arc::clone(&shared),
            deps.transcripts,
            meta,
            locale.to_string(),
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(run_resume(Arc::clone(&shared), cancel.clone())));

        // Readiness that happened before we subscribed; duplicates are ignored.
        if backend.is_ready() {
            shared.on_backend_ready();
        }

        Ok(Self {
            shared,
            cancel,
            tasks: Mutex::new(tasks),
            closed: AtomicBool::new(false),
        })
    }

    pub fn media(&self) -> &MediaSession {
        &self.shared.media
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Text of the active transcript segment, for the caption overlay.
    pub fn watch_caption(&self) -> watch::Receiver<Option<String>> {
        self.shared.caption.subscribe()
    }

    pub fn watch_transcript(&self) -> watch::Receiver<Option<ResolvedTranscript>> {
        self.shared.transcript.subscribe()
    }

    pub fn segments(&self) -> Vec<TranscriptSegment> {
        self.shared.index.lock().segments().to_vec()
    }

    pub fn active_segment(&self) -> Option<TranscriptSegment> {
        self.shared.index.lock().active().cloned()
    }

    pub fn resume_state(&self) -> ResumeState {
        self.shared.coordinator.state()
    }

    pub fn coordinator(&self) -> &ResumeCoordinator {
        &self.shared.coordinator
    }

    pub fn persistence(&self) -> &ProgressPersistence {
        &self.shared.persistence
    }

    pub async fn play(&self) -> SessionResult<()> {
        self.ensure_open()?;
        self.shared.coordinator.user_override();
        self.shared.backend.play().await?;
        Ok(())
    }

    pub async fn pause(&self) -> SessionResult<()> {
        self.ensure_open()?;
        self.shared.coordinator.user_override();
        self.shared.backend.pause().await?;
        Ok(())
    }

    pub async fn seek(&self, to_seconds: f64) -> SessionResult<()> {
        self.ensure_open()?;
        self.shared.coordinator.user_override();
        self.shared.backend.seek(to_seconds).await?;
        Ok(())
    }

    /// Start over from the beginning. After the video ended this is the
    /// replay path, which never resumes from saved progress.
    pub async fn restart(&self) -> SessionResult<()> {
        self.ensure_open()?;
        if self.shared.coordinator.state() == ResumeState::Ended {
            let outcome = self.shared.coordinator.replay(&self.cancel).await;
            self.shared.apply_outcome(&outcome);
            return match outcome {
                ResumeOutcome::Failed(err) => Err(err.into()),
                _ => Ok(()),
            };
        }

        self.shared.coordinator.user_override();
        self.shared.backend.seek(0.0).await?;
        self.shared.backend.play().await?;
        Ok(())
    }

    /// Cancel every task and timer, flush progress best-effort and release
    /// the backend. Later calls do nothing.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("[Session {}] Shutting down", self.shared.media.session_id.short());

        self.cancel.cancel();
        if let Some(scroll) = &self.shared.scroll {
            scroll.cancel();
        }
        // Not awaited; teardown does not block on the store.
        let _flush = self.shared.persistence.flush_on_teardown();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
            let _ = task.await;
        }
        self.shared.backend.detach().await;
        self.shared.state.send_replace(SessionState::Closed);

        info!("[Session {}] Closed", self.shared.media.session_id.short());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.is_closed() {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Shared {
    fn tag(&self) -> String {
        self.media.session_id.short()
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == next || *state == SessionState::Closed {
                return false;
            }
            // A reload prompt stays until the session is replaced.
            if *state == SessionState::ReloadRequired {
                return false;
            }
            *state = next;
            true
        });
    }

    fn on_backend_ready(&self) {
        if self.coordinator.backend_ready() {
            self.state.send_if_modified(|state| {
                if *state == SessionState::Loading {
                    *state = SessionState::Ready;
                    true
                } else {
                    false
                }
            });
        }
    }

    fn apply_outcome(&self, outcome: &ResumeOutcome) {
        match outcome {
            ResumeOutcome::Played { .. } => self.set_state(SessionState::Playing),
            ResumeOutcome::AwaitingUserAction => self.set_state(SessionState::AwaitingUserAction),
            ResumeOutcome::Failed(err) => {
                error!("[Session {}] Playback failed: {}", self.tag(), err);
                self.set_state(SessionState::ReloadRequired);
            }
            ResumeOutcome::Overridden | ResumeOutcome::Cancelled | ResumeOutcome::AlreadyRan => {}
        }
    }

    fn on_position(&self, seconds: f64) {
        self.persistence.on_time_update(seconds);

        let (change, caption) = {
            let mut index = self.index.lock();
            let change = index.update(seconds);
            (change, index.active_text().map(str::to_string))
        };
        if let Some(change) = change {
            self.caption.send_replace(caption);
            if let (Some(scroll), Some(current)) = (&self.scroll, change.current) {
                scroll.request(current);
            }
        }
    }

    fn on_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Ready => self.on_backend_ready(),
            PlaybackEvent::Play => {
                self.coordinator.mark_playing();
                self.set_state(SessionState::Playing);
            }
            PlaybackEvent::Pause => {
                if *self.state.borrow() != SessionState::Ended {
                    self.set_state(SessionState::Paused);
                }
                let _save = self.persistence.on_pause();
            }
            PlaybackEvent::TimeUpdate { seconds } => self.on_position(seconds),
            PlaybackEvent::Ended => {
                self.coordinator.mark_ended();
                self.set_state(SessionState::Ended);
                let _save = self.persistence.on_ended();
            }
            PlaybackEvent::Error { fatal: true } => {
                error!("[Session {}] Backend reported a fatal error", self.tag());
                self.set_state(SessionState::ReloadRequired);
            }
            PlaybackEvent::Error { fatal: false } => {
                warn!("[Session {}] Backend reported a recoverable error", self.tag());
            }
        }
    }
}

async fn pump_events(
    shared: Arc<Shared>,
    mut events: broadcast::Receiver<PlaybackEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => shared.on_event(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("[Session {}] Event pump lagged, {} events skipped", shared.tag(), skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("[Session {}] Event pump stopped", shared.tag());
}

async fn load_progress(shared: Arc<Shared>, store: Arc<dyn ProgressStore>, cancel: CancellationToken) {
    let loaded = tokio::select! {
        _ = cancel.cancelled() => return,
        loaded = store.load(&shared.media.video_id) => loaded,
    };
    let progress = match loaded {
        Ok(progress) => progress,
        Err(err) => {
            debug!(
                "[Session {}] Progress fetch failed, treating as none: {}",
                shared.tag(),
                err
            );
            None
        }
    };
    shared.coordinator.progress_loaded(progress);
}

async fn load_transcript(
    shared: Arc<Shared>,
    resolver: TranscriptResolver,
    meta: VideoMeta,
    locale: String,
    cancel: CancellationToken,
) {
    let resolved = tokio::select! {
        _ = cancel.cancelled() => return,
        resolved = resolver.resolve(&meta, &locale) => resolved,
    };

    let (change, caption) = {
        let mut index = shared.index.lock();
        let change = index.replace_segments(resolved.segments.clone());
        (change, index.active_text().map(str::to_string))
    };
    shared.transcript.send_replace(Some(resolved));
    if let Some(change) = change {
        shared.caption.send_replace(caption);
        if let (Some(scroll), Some(current)) = (&shared.scroll, change.current) {
            scroll.request(current);
        }
    }
}

async fn run_resume(shared: Arc<Shared>, cancel: CancellationToken) {
    let outcome = shared.coordinator.run(&cancel).await;
    debug!("[Session {}] Resume finished: {:?}", shared.tag(), outcome);
    shared.apply_outcome(&outcome);
}

/// Holds the session of the currently mounted video and replaces it on
/// navigation, tearing the old one down first.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: tokio::sync::Mutex<Option<Arc<PlaybackSession>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, next: PlaybackSession) -> Arc<PlaybackSession> {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            previous.shutdown().await;
        }
        let next = Arc::new(next);
        *current = Some(Arc::clone(&next));
        next
    }

    pub async fn current(&self) -> Option<Arc<PlaybackSession>> {
        self.current.lock().await.clone()
    }

    pub async fn clear(&self) {
        if let Some(previous) = self.current.lock().await.take() {
            previous.shutdown().await;
        }
    }
}
