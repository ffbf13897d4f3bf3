use tokio::sync::watch;

/// A value that is set at most once and can be awaited from any number of
/// places, before or after it is set.
///
/// Later calls to [`OnceSignal::set`] are ignored, which is what makes
/// duplicate `ready` deliveries harmless.
#[derive(Debug)]
pub struct OnceSignal<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> Default for OnceSignal<T>
where
    T: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OnceSignal<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Set the value. Returns `false` when it was already set.
    pub fn set(&self, value: T) -> bool {
        let mut value = Some(value);
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = value.take();
                true
            } else {
                false
            }
        })
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// A handle that resolves once the value is set.
    pub fn waiter(&self) -> SignalWaiter<T> {
        SignalWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

/// Awaitable side of a [`OnceSignal`].
#[derive(Debug)]
pub struct SignalWaiter<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T> SignalWaiter<T>
where
    T: Clone + Send + Sync,
{
    /// Resolve with the value. Stays pending forever if the signal is dropped
    /// without ever being set.
    pub async fn wait(mut self) -> T {
        let seen = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map(|slot| slot.clone());

        match seen {
            Ok(Some(value)) => value,
            _ => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn waiter_attached_after_set_resolves_immediately() {
        let signal = OnceSignal::new();
        assert!(signal.set(7u32));
        assert_eq!(signal.waiter().wait().await, 7);
    }

    #[tokio::test]
    async fn second_set_is_ignored() {
        let signal = OnceSignal::new();
        let waiter = signal.waiter();
        assert!(signal.set("first"));
        assert!(!signal.set("second"));
        assert_eq!(waiter.wait().await, "first");
        assert_eq!(signal.get(), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_signal_never_resolves() {
        let signal = OnceSignal::<u8>::new();
        let waiter = signal.waiter();
        drop(signal);
        let outcome =
            tokio::time::timeout(Duration::from_secs(60), waiter.wait()).await;
        assert!(outcome.is_err());
    }
}
