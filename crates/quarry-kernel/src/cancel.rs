//! [`StopSignal`] – cooperative cancellation.
//!
//! One signal is created per mining session.  The loop calls
//! [`StopSignal::checkpoint`] after every suspension point and before
//! committing to the next one, so a stop is honoured within one unit of
//! work.  Triggering is synchronous and never blocks, which makes it safe to
//! call straight from a lifecycle event handler.
//!
//! # Example
//!
//! ```rust
//! use quarry_kernel::StopSignal;
//!
//! let signal = StopSignal::new();
//! assert!(signal.checkpoint().is_ok());
//!
//! signal.trigger();
//! assert!(signal.checkpoint().is_err());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use quarry_types::QuarryError;
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    notify: Notify,
}

/// Shared, cloneable stop flag.  All clones observe the same state.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every task parked in [`sleep`][Self::sleep]
    /// or [`triggered`][Self::triggered].
    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the flag is raised.
    pub fn checkpoint(&self) -> Result<(), QuarryError> {
        if self.is_triggered() {
            Err(QuarryError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Err(Cancelled)` if the
    /// flag is raised meanwhile.
    pub async fn sleep(&self, duration: Duration) -> Result<(), QuarryError> {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        self.checkpoint()?;
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.checkpoint(),
            _ = notified => Err(QuarryError::Cancelled),
        }
    }

    /// Resolve once the flag is raised.
    pub async fn triggered(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn clones_share_state() {
        let a = StopSignal::new();
        let b = a.clone();
        b.trigger();
        assert!(a.is_triggered());
        assert!(matches!(a.checkpoint(), Err(QuarryError::Cancelled)));
    }

    #[tokio::test]
    async fn sleep_completes_when_not_triggered() {
        let signal = StopSignal::new();
        assert!(signal.sleep(Duration::from_millis(5)).await.is_ok());
    }

    #[tokio::test]
    async fn trigger_wakes_a_sleeper_early() {
        let signal = StopSignal::new();
        let sleeper = {
            let signal = signal.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let result = signal.sleep(Duration::from_secs(30)).await;
                (result, started.elapsed())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.trigger();
        let (result, elapsed) = sleeper.await.unwrap();
        assert!(matches!(result, Err(QuarryError::Cancelled)));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn sleep_after_trigger_returns_immediately() {
        let signal = StopSignal::new();
        signal.trigger();
        assert!(signal.sleep(Duration::from_secs(30)).await.is_err());
    }

    #[tokio::test]
    async fn triggered_resolves() {
        let signal = StopSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.triggered().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.trigger();
        waiter.await.unwrap();
    }
}
