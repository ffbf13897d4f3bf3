//! Resume-from-saved-position state machine.
//!
//! Two inputs arrive independently and in any order: the backend becoming
//! ready and the saved progress being loaded. The decision commits once
//! both are known, or once the resume timeout has passed since readiness,
//! and the resulting seek/play sequence runs at most once per session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use vireo_config::ResumeSettings;
use vireo_model::SavedProgress;

use crate::backend::PlaybackBackend;
use crate::error::BackendError;
use crate::sync::{OnceSignal, join_with_grace};

/// What to do once both inputs are known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResumeDecision {
    SeekThenPlay(f64),
    PlayFromStart,
}

impl ResumeDecision {
    /// Resume only from a position strictly inside the video whose saved
    /// percentage is below `max_resume_percent`.
    pub fn decide(
        progress: Option<&SavedProgress>,
        duration_seconds: f64,
        max_resume_percent: f64,
    ) -> Self {
        match progress {
            Some(progress)
                if progress.watched_seconds > 0.0
                    && progress.watched_seconds < duration_seconds
                    && progress.percentage < max_resume_percent =>
            {
                ResumeDecision::SeekThenPlay(progress.watched_seconds)
            }
            _ => ResumeDecision::PlayFromStart,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResumeState {
    Idle,
    WaitingForInputs,
    Resolved(ResumeDecision),
    Seeking { target: f64 },
    Playing,
    /// Automatic play was refused; the user has to start playback.
    AwaitingUserAction,
    /// The user acted before the automatic decision ran.
    Overridden,
    Ended,
    Replaying,
}

/// How a run of the coordinator finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    Played { seeked_to: Option<f64> },
    AwaitingUserAction,
    Overridden,
    Failed(BackendError),
    Cancelled,
    AlreadyRan,
}

pub struct ResumeCoordinator {
    backend: Arc<dyn PlaybackBackend>,
    duration_seconds: f64,
    settings: ResumeSettings,
    ready: OnceSignal<()>,
    progress: OnceSignal<Option<SavedProgress>>,
    has_resumed: AtomicBool,
    started: AtomicBool,
    user_acted: AtomicBool,
    state: watch::Sender<ResumeState>,
}

impl std::fmt::Debug for ResumeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeCoordinator")
            .field("state", &*self.state.borrow())
            .field("has_resumed", &self.has_resumed.load(Ordering::SeqCst))
            .field("backend_ready", &self.ready.is_set())
            .field("progress_loaded", &self.progress.is_set())
            .finish()
    }
}

impl ResumeCoordinator {
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        duration_seconds: f64,
        settings: ResumeSettings,
    ) -> Self {
        let (state, _rx) = watch::channel(ResumeState::Idle);
        Self {
            backend,
            duration_seconds,
            settings,
            ready: OnceSignal::new(),
            progress: OnceSignal::new(),
            has_resumed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            user_acted: AtomicBool::new(false),
            state,
        }
    }

    /// Record backend readiness. Duplicates are ignored; returns whether
    /// this call was the first.
    pub fn backend_ready(&self) -> bool {
        let first = self.ready.set(());
        if !first {
            debug!("[Resume] Duplicate backend ready ignored");
        }
        first
    }

    /// Record the saved progress (`None` when there is none). Only the
    /// first delivery counts.
    pub fn progress_loaded(&self, progress: Option<SavedProgress>) -> bool {
        let first = self.progress.set(progress);
        if !first {
            debug!("[Resume] Duplicate progress delivery ignored");
        }
        first
    }

    pub fn state(&self) -> ResumeState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResumeState> {
        self.state.subscribe()
    }

    pub fn has_resumed(&self) -> bool {
        self.has_resumed.load(Ordering::SeqCst)
    }

    /// Wait for both inputs (or the timeout), decide, and execute.
    ///
    /// Only the first call does anything; later calls return
    /// [`ResumeOutcome::AlreadyRan`].
    pub async fn run(&self, cancel: &CancellationToken) -> ResumeOutcome {
        if self.started.swap(true, Ordering::SeqCst) {
            return ResumeOutcome::AlreadyRan;
        }
        if self.has_resumed() {
            return ResumeOutcome::Overridden;
        }
        self.set_state(ResumeState::WaitingForInputs);

        let joined = join_with_grace(
            self.ready.waiter().wait(),
            self.progress.waiter().wait(),
            self.settings.timeout(),
        );
        let progress = tokio::select! {
            _ = cancel.cancelled() => return ResumeOutcome::Cancelled,
            (_, progress) = joined => progress,
        };

        let progress = match progress {
            Some(progress) => progress,
            None => {
                info!(
                    "[Resume] No saved progress within {:?} of ready, starting from the beginning",
                    self.settings.timeout()
                );
                None
            }
        };

        let decision = if self.settings.enabled {
            ResumeDecision::decide(
                progress.as_ref(),
                self.duration_seconds,
                self.settings.max_resume_percent,
            )
        } else {
            ResumeDecision::PlayFromStart
        };

        self.execute(decision, cancel).await
    }

    /// Carry out `decision` unless playback was already claimed.
    pub async fn execute(
        &self,
        decision: ResumeDecision,
        cancel: &CancellationToken,
    ) -> ResumeOutcome {
        if self.has_resumed.swap(true, Ordering::SeqCst) {
            debug!("[Resume] Already resumed, {:?} skipped", decision);
            return ResumeOutcome::Overridden;
        }
        info!("[Resume] Decision: {:?}", decision);
        self.set_state(ResumeState::Resolved(decision));

        let mut seeked_to = None;
        if let ResumeDecision::SeekThenPlay(target) = decision {
            self.set_state(ResumeState::Seeking { target });
            match self.backend.seek(target).await {
                Ok(()) => {
                    // No seek acknowledgement exists; give the player a moment.
                    tokio::select! {
                        _ = cancel.cancelled() => return ResumeOutcome::Cancelled,
                        _ = tokio::time::sleep(self.settings.seek_settle()) => {}
                    }
                    if self.user_acted.load(Ordering::SeqCst) {
                        debug!("[Resume] User acted during seek settle, automatic play skipped");
                        self.set_state(ResumeState::Overridden);
                        return ResumeOutcome::Overridden;
                    }
                    seeked_to = Some(target);
                }
                Err(err) => {
                    warn!("[Resume] Seek to {:.1}s failed, playing from current position: {}", target, err);
                }
            }
        }

        self.start_playback(seeked_to).await
    }

    /// The user pressed play, pause or seek. Claims the resume so the
    /// automatic decision never overrides them. Returns whether the claim
    /// was taken by this call.
    pub fn user_override(&self) -> bool {
        self.user_acted.store(true, Ordering::SeqCst);
        let claimed = !self.has_resumed.swap(true, Ordering::SeqCst);
        if claimed {
            info!("[Resume] User acted first, automatic resume cancelled");
            self.set_state(ResumeState::Overridden);
        }
        claimed
    }

    /// Playback started (after a user gesture, for instance).
    pub fn mark_playing(&self) {
        self.state.send_if_modified(|state| {
            if matches!(
                state,
                ResumeState::AwaitingUserAction | ResumeState::Overridden | ResumeState::Replaying
            ) {
                *state = ResumeState::Playing;
                true
            } else {
                false
            }
        });
    }

    pub fn mark_ended(&self) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(
                state,
                ResumeState::Playing | ResumeState::Overridden | ResumeState::AwaitingUserAction
            ) {
                *state = ResumeState::Ended;
                true
            } else {
                false
            }
        })
    }

    /// Restart after the video ended. Always plays from the beginning and
    /// ignores saved progress.
    pub async fn replay(&self, cancel: &CancellationToken) -> ResumeOutcome {
        self.has_resumed.store(true, Ordering::SeqCst);
        self.user_acted.store(false, Ordering::SeqCst);
        self.set_state(ResumeState::Replaying);

        if let Err(err) = self.backend.seek(0.0).await {
            warn!("[Resume] Rewind before replay failed: {}", err);
        } else {
            tokio::select! {
                _ = cancel.cancelled() => return ResumeOutcome::Cancelled,
                _ = tokio::time::sleep(self.settings.seek_settle()) => {}
            }
        }

        self.set_state(ResumeState::Resolved(ResumeDecision::PlayFromStart));
        self.start_playback(None).await
    }

    async fn start_playback(&self, seeked_to: Option<f64>) -> ResumeOutcome {
        match self.backend.play().await {
            Ok(()) => {
                self.set_state(ResumeState::Playing);
                ResumeOutcome::Played { seeked_to }
            }
            Err(err) if err.is_fatal() => {
                warn!("[Resume] Play failed fatally: {}", err);
                ResumeOutcome::Failed(err)
            }
            Err(err) => {
                info!("[Resume] Play refused ({}), waiting for the user", err);
                self.set_state(ResumeState::AwaitingUserAction);
                ResumeOutcome::AwaitingUserAction
            }
        }
    }

    fn set_state(&self, next: ResumeState) {
        self.state.send_replace(next);
    }
}
