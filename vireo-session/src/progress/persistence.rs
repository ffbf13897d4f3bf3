use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vireo_config::PersistenceSettings;
use vireo_model::{ProgressUpdate, VideoId};

use super::ProgressStore;
use crate::sync::Debouncer;

#[derive(Debug, Default)]
struct Tracker {
    /// Most recent position reported by the backend.
    latest: Option<f64>,
    /// Position movement is measured from: first observed, then last saved.
    anchor: Option<f64>,
    /// Last position the store accepted.
    saved: Option<f64>,
}

struct Inner {
    video_id: VideoId,
    duration_seconds: f64,
    settings: PersistenceSettings,
    store: Arc<dyn ProgressStore>,
    tracker: Mutex<Tracker>,
}

/// Rate-limited progress saving for one session.
///
/// Once playback has moved `save_every_secs` from the anchor, a trailing
/// debounce is armed; updates arriving while it waits coalesce into that one
/// write, which saves whatever the latest position is when it fires.
#[derive(Clone)]
pub struct ProgressPersistence {
    inner: Arc<Inner>,
    debouncer: Arc<Debouncer>,
}

impl std::fmt::Debug for ProgressPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressPersistence")
            .field("video_id", &self.inner.video_id)
            .field("tracker", &*self.inner.tracker.lock())
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl ProgressPersistence {
    pub fn new(
        video_id: VideoId,
        duration_seconds: f64,
        settings: PersistenceSettings,
        store: Arc<dyn ProgressStore>,
        cancel: &CancellationToken,
    ) -> Self {
        let debouncer = Arc::new(Debouncer::new(settings.debounce(), cancel));
        Self {
            inner: Arc::new(Inner {
                video_id,
                duration_seconds,
                settings,
                store,
                tracker: Mutex::new(Tracker::default()),
            }),
            debouncer,
        }
    }

    pub fn on_time_update(&self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let moved = {
            let mut tracker = self.inner.tracker.lock();
            tracker.latest = Some(seconds);
            let anchor = *tracker.anchor.get_or_insert(seconds);
            (seconds - anchor).abs() >= self.inner.settings.save_every_secs
        };

        if moved {
            let inner = Arc::clone(&self.inner);
            if self.debouncer.schedule_if_idle(async move {
                inner.save_latest().await;
            }) {
                trace!("[Progress] Save armed at {:.1}s", seconds);
            }
        }
    }

    /// Pausing always saves, right away. The write runs on its own task so
    /// event handling never waits on the store.
    pub fn on_pause(&self) -> JoinHandle<bool> {
        self.debouncer.cancel_pending();
        let latest = self.inner.tracker.lock().latest;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match latest {
                Some(position) => inner.save_position(position).await,
                None => {
                    debug!("[Progress] Nothing to save for {} yet", inner.video_id);
                    false
                }
            }
        })
    }

    /// The video played to the end: record it as fully watched.
    pub fn on_ended(&self) -> JoinHandle<bool> {
        self.debouncer.cancel_pending();
        let duration = self.inner.duration_seconds;
        self.inner.tracker.lock().latest = Some(duration);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.save_position(duration).await })
    }

    /// Stop the debounce and, if there is unsaved movement, save it on a
    /// detached task so teardown never waits on the network.
    pub fn flush_on_teardown(&self) -> Option<JoinHandle<()>> {
        self.debouncer.shutdown();

        let unsaved = {
            let tracker = self.inner.tracker.lock();
            match (tracker.latest, tracker.saved) {
                (Some(latest), Some(saved)) if latest == saved => None,
                (latest, _) => latest,
            }
        };

        let position = unsaved?;
        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            inner.save_position(position).await;
        }))
    }

    pub fn latest_position(&self) -> Option<f64> {
        self.inner.tracker.lock().latest
    }

    pub fn last_saved_position(&self) -> Option<f64> {
        self.inner.tracker.lock().saved
    }

    pub fn is_save_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl Inner {
    async fn save_latest(&self) -> bool {
        let latest = self.tracker.lock().latest;
        match latest {
            Some(position) => self.save_position(position).await,
            None => {
                debug!("[Progress] Nothing to save for {} yet", self.video_id);
                false
            }
        }
    }

    async fn save_position(&self, position: f64) -> bool {
        let update = ProgressUpdate::from_position(
            position,
            self.duration_seconds,
            self.settings.completion_percent,
        );

        match self.store.save(&self.video_id, &update).await {
            Ok(()) => {
                let mut tracker = self.tracker.lock();
                tracker.anchor = Some(position);
                tracker.saved = Some(position);
                trace!(
                    "[Progress] Saved {} at {:.1}s ({:.0}%)",
                    self.video_id, position, update.progress_percentage
                );
                true
            }
            Err(err) => {
                // Anchor stays put so the next cycle retries.
                debug!("[Progress] Save for {} failed: {}", self.video_id, err);
                false
            }
        }
    }
}
