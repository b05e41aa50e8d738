//! Single-assignment value with broadcast wakeup

use parking_lot::Mutex;
use tokio::sync::Notify;

/// A value published at most once; every waiter is released together
#[derive(Debug)]
pub(crate) struct Promise<T> {
    value: Mutex<Option<T>>,
    ready: Notify,
}

impl<T: Clone> Promise<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Notify::new(),
        }
    }

    /// Publish `value`. Returns false and drops `value` if already published.
    pub(crate) fn fulfill(&self, value: T) -> bool {
        {
            let mut slot = self.value.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
        }
        self.ready.notify_waiters();
        true
    }

    /// Wait until a value is published
    pub(crate) async fn wait(&self) -> T {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let current = self.value.lock().clone();
            if let Some(value) = current {
                return value;
            }

            notified.await;
        }
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        self.value.lock().is_some()
    }

    /// Remove the published value, ending this generation
    pub(crate) fn take(&self) -> Option<T> {
        self.value.lock().take()
    }
}
