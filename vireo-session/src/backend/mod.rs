//! Uniform control surface over the two playback engines.
//!
//! A [`LocalBackend`] drives a media element owned by this process. A
//! [`RemoteBridgeBackend`] talks to an embedded player through messages and
//! never learns when a seek has actually completed.
//!
//! Both buffer the latest command issued before the engine is ready in a
//! single-slot [`Mailbox`] and flush it once on readiness.

pub mod bridge;
pub mod local;
pub mod simulated;

use async_trait::async_trait;
use log::debug;
use tokio::sync::broadcast;
use vireo_model::{BackendKind, PlaybackEvent};

use crate::error::BackendResult;
use crate::sync::{Mailbox, OnceSignal, SignalWaiter};

pub use bridge::{
    BridgeCommand, BridgeMessage, ChannelPeer, ChannelTransport, BridgeTransport,
    RemoteBridgeBackend, ReplyValue, channel_bridge, spawn_json_lines_bridge,
};
pub use local::{LocalBackend, MediaElement};
pub use simulated::SimulatedMedia;

/// Control surface shared by every backend kind.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn is_ready(&self) -> bool;

    /// Start playback. Before readiness the request is parked and replayed
    /// once the engine is ready.
    async fn play(&self) -> BackendResult<()>;

    async fn pause(&self) -> BackendResult<()>;

    /// Request a seek. Completion is not acknowledged by every engine.
    async fn seek(&self, to_seconds: f64) -> BackendResult<()>;

    async fn current_time(&self) -> BackendResult<f64>;

    async fn is_paused(&self) -> BackendResult<bool>;

    /// Events emitted from now on. `Ready` fires once per backend.
    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent>;

    /// Stop emitting and release the engine. Safe to call more than once.
    async fn detach(&self);
}

/// A control request that can be parked until the backend is ready.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Play,
    Pause,
    Seek(f64),
}

/// State every backend implementation carries: the event fan-out, the
/// one-time readiness signal and the pending-intent slot.
#[derive(Debug)]
pub struct BackendCore {
    kind: BackendKind,
    events: broadcast::Sender<PlaybackEvent>,
    ready: OnceSignal<()>,
    pending: Mailbox<Intent>,
}

impl BackendCore {
    pub fn new(kind: BackendKind, event_capacity: usize) -> Self {
        let (events, _rx) = broadcast::channel(event_capacity.max(1));
        Self {
            kind,
            events,
            ready: OnceSignal::new(),
            pending: Mailbox::new(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_set()
    }

    pub fn ready_waiter(&self) -> SignalWaiter<()> {
        self.ready.waiter()
    }

    /// Flip to ready and emit `Ready`. Returns the parked intent on the
    /// first call and `None` on every later call.
    pub fn mark_ready(&self) -> Option<Option<Intent>> {
        if !self.ready.set(()) {
            debug!("[{}] Duplicate ready ignored", self.kind);
            return None;
        }
        self.emit(PlaybackEvent::Ready);
        Some(self.pending.take())
    }

    /// Park `intent` while not ready.
    ///
    /// Returns the intent to execute right away when the backend is already
    /// ready. If readiness lands between the check and the park, whichever
    /// side takes the slot first runs it, so it still runs exactly once.
    pub fn defer(&self, intent: Intent) -> Option<Intent> {
        if self.is_ready() {
            return Some(intent);
        }
        if let Some(replaced) = self.pending.put(intent) {
            debug!("[{}] Pending {:?} replaced by {:?}", self.kind, replaced, intent);
        }
        if self.is_ready() {
            return self.pending.take();
        }
        None
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
