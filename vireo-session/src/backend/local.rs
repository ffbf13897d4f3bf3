use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vireo_config::SessionConfig;
use vireo_model::{BackendKind, PlaybackEvent};

use super::{BackendCore, Intent, PlaybackBackend};
use crate::error::{BackendError, BackendResult};

/// A media resource owned by this process.
///
/// Every call is synchronous and takes effect immediately; state is polled
/// by the backend at its tick rate.
pub trait MediaElement: Send + Sync {
    /// Enough data is loaded to start playback.
    fn is_loaded(&self) -> bool;

    fn position(&self) -> f64;

    fn duration(&self) -> f64;

    fn is_paused(&self) -> bool;

    fn has_ended(&self) -> bool;

    fn set_paused(&self, paused: bool) -> BackendResult<()>;

    fn set_position(&self, seconds: f64) -> BackendResult<()>;

    /// A failure raised by the element since the last call.
    fn take_fault(&self) -> Option<BackendError>;
}

/// Backend over a locally owned [`MediaElement`].
pub struct LocalBackend {
    core: Arc<BackendCore>,
    media: Arc<dyn MediaElement>,
    cancel: CancellationToken,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("ready", &self.core.is_ready())
            .field("detached", &self.cancel.is_cancelled())
            .finish()
    }
}

impl LocalBackend {
    /// Start watching `media`, sampling its state every `tick`.
    pub fn attach(media: Arc<dyn MediaElement>, tick: Duration, event_capacity: usize) -> Self {
        let core = Arc::new(BackendCore::new(BackendKind::Local, event_capacity));
        let cancel = CancellationToken::new();

        let watcher = tokio::spawn(watch_media(
            Arc::clone(&core),
            Arc::clone(&media),
            tick,
            cancel.clone(),
        ));

        Self {
            core,
            media,
            cancel,
            watcher: Mutex::new(Some(watcher)),
        }
    }

    pub fn from_config(media: Arc<dyn MediaElement>, config: &SessionConfig) -> Self {
        Self::attach(media, config.view.local_tick(), config.bridge.event_capacity)
    }

    fn run(&self, intent: Intent) -> BackendResult<()> {
        apply_intent(self.media.as_ref(), intent)
    }
}

fn apply_intent(media: &dyn MediaElement, intent: Intent) -> BackendResult<()> {
    match intent {
        Intent::Play => media.set_paused(false),
        Intent::Pause => media.set_paused(true),
        Intent::Seek(seconds) => media.set_position(seconds),
    }
}

async fn watch_media(
    core: Arc<BackendCore>,
    media: Arc<dyn MediaElement>,
    tick: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut was_paused = true;
    let mut ended = false;
    let mut last_position: Option<f64> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        if let Some(fault) = media.take_fault() {
            let fatal = fault.is_fatal();
            warn!("[Local] Media fault (fatal: {}): {}", fatal, fault);
            core.emit(PlaybackEvent::Error { fatal });
            if fatal {
                break;
            }
        }

        if !core.is_ready() {
            if !media.is_loaded() {
                continue;
            }
            if let Some(parked) = core.mark_ready() {
                info!("[Local] Media loaded ({:.1}s)", media.duration());
                if let Some(intent) = parked
                    && let Err(err) = apply_intent(media.as_ref(), intent)
                {
                    warn!("[Local] Parked {:?} failed on ready: {}", intent, err);
                }
            }
        }

        let paused = media.is_paused();
        if paused != was_paused {
            was_paused = paused;
            core.emit(if paused {
                PlaybackEvent::Pause
            } else {
                PlaybackEvent::Play
            });
        }

        let position = media.position();
        if !paused && last_position != Some(position) {
            last_position = Some(position);
            core.emit(PlaybackEvent::TimeUpdate { seconds: position });
        }

        if media.has_ended() {
            if !ended {
                ended = true;
                core.emit(PlaybackEvent::Ended);
            }
        } else {
            ended = false;
        }
    }

    debug!("[Local] Watcher stopped");
}

#[async_trait]
impl PlaybackBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    async fn play(&self) -> BackendResult<()> {
        match self.core.defer(Intent::Play) {
            Some(intent) => self.run(intent),
            None => Ok(()),
        }
    }

    async fn pause(&self) -> BackendResult<()> {
        match self.core.defer(Intent::Pause) {
            Some(intent) => self.run(intent),
            None => Ok(()),
        }
    }

    async fn seek(&self, to_seconds: f64) -> BackendResult<()> {
        if !to_seconds.is_finite() {
            return Err(BackendError::Rejected(format!("seek to {to_seconds}")));
        }
        match self.core.defer(Intent::Seek(to_seconds)) {
            Some(intent) => self.run(intent),
            None => Ok(()),
        }
    }

    async fn current_time(&self) -> BackendResult<f64> {
        Ok(self.media.position())
    }

    async fn is_paused(&self) -> BackendResult<bool> {
        Ok(self.media.is_paused())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.core.subscribe()
    }

    async fn detach(&self) {
        self.cancel.cancel();
        let watcher = self.watcher.lock().take();
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedMedia;

    async fn next_event(
        events: &mut broadcast::Receiver<PlaybackEvent>,
        wanted: fn(&PlaybackEvent) -> bool,
    ) -> PlaybackEvent {
        loop {
            let event = events.recv().await.expect("event");
            if wanted(&event) {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn parked_play_runs_once_media_loads() {
        let media = Arc::new(SimulatedMedia::new(60.0).with_load_delay(Duration::from_secs(1)));
        let backend = LocalBackend::attach(media.clone(), Duration::from_millis(250), 64);
        let mut events = backend.subscribe();

        backend.play().await.expect("parked");
        assert!(!backend.is_ready());
        assert!(media.is_paused());

        assert_eq!(
            next_event(&mut events, |e| matches!(e, PlaybackEvent::Ready)).await,
            PlaybackEvent::Ready
        );
        next_event(&mut events, |e| matches!(e, PlaybackEvent::Play)).await;
        assert!(!media.is_paused());

        backend.detach().await;
    }

    #[tokio::test(start_paused = true)]
    async fn emits_time_updates_and_ended_once() {
        let media = Arc::new(SimulatedMedia::new(2.0));
        let backend = LocalBackend::attach(media.clone(), Duration::from_millis(250), 64);
        let mut events = backend.subscribe();

        next_event(&mut events, |e| matches!(e, PlaybackEvent::Ready)).await;
        backend.play().await.expect("play");

        let update = next_event(&mut events, |e| matches!(e, PlaybackEvent::TimeUpdate { .. })).await;
        assert!(matches!(update, PlaybackEvent::TimeUpdate { seconds } if seconds >= 0.0));

        next_event(&mut events, |e| matches!(e, PlaybackEvent::Ended)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut extra_ended = 0;
        while let Ok(event) = events.try_recv() {
            if event == PlaybackEvent::Ended {
                extra_ended += 1;
            }
        }
        assert_eq!(extra_ended, 0);
        backend.detach().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_fault_surfaces_as_error_event() {
        let media = Arc::new(SimulatedMedia::new(30.0));
        let backend = LocalBackend::attach(media.clone(), Duration::from_millis(250), 64);
        let mut events = backend.subscribe();

        media.inject_fault(BackendError::Fatal("decoder lost".into()));
        let event = next_event(&mut events, |e| matches!(e, PlaybackEvent::Error { .. })).await;
        assert_eq!(event, PlaybackEvent::Error { fatal: true });
        backend.detach().await;
    }
}
