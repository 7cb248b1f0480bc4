//! Level-triggered event flag.
//!
//! A [`Signal`] stays raised until it is explicitly cleared, and any
//! number of tasks can wait for it. This is different from a bare
//! [`Notify`], whose permits are consumed by a single waiter. The game
//! uses signals for the countdown's start and reset conditions and for
//! process shutdown.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A flag that tasks can wait on until it is raised.
#[derive(Debug, Default)]
pub struct Signal {
    /// Whether the signal is currently raised.
    raised: AtomicBool,

    /// Wakes waiters when the signal is raised.
    notify: Notify,
}

impl Signal {
    /// Create a lowered signal.
    pub fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Raise the signal and wake every waiter.
    pub fn set(&self) {
        self.raised.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Lower the signal. Waiters that already returned are unaffected.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Whether the signal is currently raised.
    pub fn is_set(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Wait until the signal is raised.
    ///
    /// Returns immediately if it already is. Does not lower the signal.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a `set` between the
            // check and the await is not lost.
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_when_raised() {
        let signal = Signal::new();
        signal.set();
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
        assert!(waited.is_ok());
        assert!(signal.is_set());
    }

    #[tokio::test]
    async fn set_wakes_every_waiter() {
        let signal = Arc::new(Signal::new());
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let s = Arc::clone(&signal);
            waiters.push(tokio::spawn(async move { s.wait().await }));
        }
        tokio::task::yield_now().await;
        signal.set();
        for waiter in waiters {
            let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
            assert!(matches!(joined, Ok(Ok(()))));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_signal_blocks() {
        let signal = Signal::new();
        signal.set();
        signal.clear();
        assert!(!signal.is_set());
        let waited = tokio::time::timeout(Duration::from_secs(5), signal.wait()).await;
        assert!(waited.is_err());
    }
}
