use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Pending {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Trailing-edge timer that runs a future after a quiet period.
///
/// Every armed timer is a child of the owner's cancellation token, so
/// cancelling the owner silences anything still waiting.
pub struct Debouncer {
    delay: Duration,
    parent: CancellationToken,
    pending: Mutex<Option<Pending>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Debouncer {
    pub fn new(delay: Duration, parent: &CancellationToken) -> Self {
        Self {
            delay,
            parent: parent.child_token(),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Re-arm: any waiting timer is dropped and `action` runs after a full
    /// delay from now.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.cancel.cancel();
        }
        *pending = self.arm(action);
    }

    /// Arm only when nothing is waiting. Returns whether a timer was armed.
    pub fn schedule_if_idle<F>(&self, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(Pending::is_live) {
            return false;
        }
        *pending = self.arm(action);
        pending.is_some()
    }

    /// Drop the waiting timer, if any. An action that already started keeps
    /// running.
    pub fn cancel_pending(&self) -> bool {
        match self.pending.lock().take() {
            Some(previous) => {
                let was_live = previous.is_live();
                previous.cancel.cancel();
                was_live
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(Pending::is_live)
    }

    /// Cancel the waiting timer and refuse to arm new ones.
    pub fn shutdown(&self) {
        self.parent.cancel();
        self.cancel_pending();
    }

    fn arm<F>(&self, action: F) -> Option<Pending>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.parent.is_cancelled() {
            return None;
        }
        let cancel = self.parent.child_token();
        let guard = cancel.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            action.await;
        });
        Some(Pending { cancel, handle })
    }
}

impl Pending {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.parent.cancel();
    }
}
